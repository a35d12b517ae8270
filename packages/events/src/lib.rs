//! A small generic event bus.
//!
//! Producers publish through a capability trait ([`sender::Sender`]) so they
//! can be handed a disabled bus, and consumers pull through
//! [`receiver::Receiver`]. The only implementation is a tokio broadcast
//! channel ([`broadcaster::Broadcaster`]).
pub mod broadcaster;
pub mod bus;
pub mod receiver;
pub mod sender;

use std::fmt;
use std::fmt::Debug;

/// A trait for sending events.
///
/// Sending is synchronous: the underlying channel never blocks the publisher.
pub trait Sender: Sync + Send {
    type Event: Send + Clone;

    /// Sends an event to all active receivers.
    ///
    /// - `Ok(n)` — the event was delivered to `n` receivers.
    /// - `Err(e)` — there was no receiver to deliver to; the event is handed
    ///   back inside the error.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] wrapping the event when no receiver is
    /// subscribed.
    fn send(&self, event: Self::Event) -> Result<usize, SendError<Self::Event>>;
}

/// Error returned by the [`Sender::send`] function.
#[derive(Debug)]
pub struct SendError<Event>(pub Event);

impl<Event> fmt::Display for SendError<Event> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl<Event: fmt::Debug> std::error::Error for SendError<Event> {}

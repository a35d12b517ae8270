//! Application jobs launchers.
//!
//! The main application setup has only two main stages:
//!
//! 1. Setup the domain layer: the seeding core container.
//! 2. Launch all the background loops as concurrent jobs.
//!
//! This module contains all the functions needed to start those jobs.
pub mod bandwidth_dispatcher;
pub mod event_listener;
pub mod hit_and_run;
pub mod ip_refresher;
pub mod manager;
pub mod seeder;
pub mod torrent_watcher;

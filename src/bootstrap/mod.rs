//! Application bootstrapping: process-wide setup and the background job
//! launchers.
pub mod app;
pub mod jobs;

//! seat-watch - A chat bot that watches class seat availability.
//!
//! Users subscribe to class codes through chat commands. A background sweep
//! periodically probes every active subscription concurrently and notifies
//! each user at most once per sweep when seats open up.

pub mod bot;
pub mod config;
pub mod entity;
pub mod error;
pub mod logging;
pub mod message;
pub mod notify;
pub mod probe;
pub mod repository;
pub mod service;
pub mod task;

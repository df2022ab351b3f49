//! Background tasks and the sweep engine.

pub mod checker;
pub mod sweep;
pub mod sweep_scheduler;
pub mod update_poller;

//! Chat front end: command parsing and handling.

pub mod command;
pub mod processor;

#![doc = include_str!("../README.md")]

pub mod client;
mod error;
pub mod server;
pub mod telemetry;

pub use crate::client::HttpSource;
pub use crate::error::*;

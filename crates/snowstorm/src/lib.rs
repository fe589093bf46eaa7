#![doc = include_str!("../README.md")]

pub mod base36;
mod error;
mod factory;
mod layout;
mod pool;
mod source;
mod time;

pub use crate::error::*;
pub use crate::factory::*;
pub use crate::layout::*;
pub use crate::pool::*;
pub use crate::source::*;
pub use crate::time::*;

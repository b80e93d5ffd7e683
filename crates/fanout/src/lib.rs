#![doc = include_str!("../README.md")]

mod aggregate;
mod error;
mod status;
mod workload;

pub use crate::aggregate::*;
pub use crate::error::*;
pub use crate::status::*;
pub use crate::workload::*;

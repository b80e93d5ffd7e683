#![doc = include_str!("../README.md")]

mod common;
pub use common::*;
// Public re-export so downstream crates can access `fanout` via
// `fanout_tonic_core::fanout`
pub use fanout;

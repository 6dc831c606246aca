#![doc = include_str!("../README.md")]

pub mod adapter;
pub mod app;
pub mod config;
pub mod error;
pub mod session;
pub mod station;
pub mod tnc;
pub mod transport;

#[cfg(test)]
mod test_util;

// Frame types needed to implement a custom monitor adapter
pub use tnc2core::monitor::{FrameKind, MonitorLine};

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod address;
pub mod kiss;
pub mod monitor;
pub mod protocol;

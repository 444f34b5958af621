//! Test helpers module
//!
//! Temp-dir backed store fixtures, a recording reopen scheduler and sample
//! documents shared by the integration tests.

#![allow(dead_code)]

pub mod recording_scheduler;
pub mod test_data;
pub mod test_store;

pub use recording_scheduler::*;
pub use test_data::*;
pub use test_store::*;

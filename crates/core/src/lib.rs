//! Domain model and progression rules for the adaptive tutor.
//!
//! Nothing in this crate performs I/O; storage and orchestration live in the
//! `storage` and `services` crates.

pub mod error;
pub mod model;
pub mod progression;
pub mod time;

pub use error::Error;
pub use time::Clock;

//! DanceMatch Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every DanceMatch crate:
//! - Session time primitives (SessionTime)
//! - Clocks (monotonic and manually driven)
//! - The workspace error type

pub mod clock;
pub mod error;
pub mod time;

pub use clock::*;
pub use error::*;
pub use time::*;

//! DanceMatch Runtime - Session orchestration and frame loop
//!
//! Each camera frame runs through five stages:
//! 1. Mirror and crop
//! 2. Bind to the current session (advancing the countdown)
//! 3. Detect the pose
//! 4. Score, smooth and publish
//! 5. Annotate for display
//!
//! `DanceSession` is the control surface; `server` exposes it over HTTP.

pub mod config;
pub mod control;
pub mod frame;
pub mod observability;
pub mod overlay;
pub mod pipeline;
pub mod server;
pub mod session;
pub mod state;
pub mod synthetic;

pub use config::*;
pub use control::*;
pub use frame::*;
pub use observability::*;
pub use overlay::*;
pub use pipeline::*;
pub use session::*;
pub use state::*;

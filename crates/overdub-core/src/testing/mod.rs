//! Utilities for exercising the engine end to end, shared by the crate's
//! own tests and available to downstream hosts.

mod rig;

pub use rig::RecordingRig;

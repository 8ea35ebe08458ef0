//! Radio collaborator interface and frame layout
//!
//! The protocol core drives the radio only through the [`Radio`] trait. The
//! byte layout of beacon and send frames lives in [`frame`].

/// Beacon and send frame codec
pub mod frame;
/// Radio collaborator trait
pub mod traits;

pub use frame::{BeaconFrame, FrameError, SendFrames, FRAME_LEN};
pub use traits::Radio;

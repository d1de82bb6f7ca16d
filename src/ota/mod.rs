//! Over-the-air firmware update.
//!
//! [`OtaController`] accepts requests from the dispatcher; each accepted
//! request runs on a dedicated worker thread that streams the image from a
//! [`FirmwareSource`](crate::app::ports::FirmwareSource) into the inactive
//! boot partition through a [`FlashPort`](crate::app::ports::FlashPort).

pub mod controller;
pub mod image;
pub mod state;
pub mod stats;
mod worker;

pub use controller::{OtaController, OtaPorts};
pub use image::AppVersion;
pub use state::{OtaConfig, OtaError, OtaResult, OtaState};
pub use stats::OtaStatistics;
pub use worker::{percent_of, OTA_CHUNK_SIZE};

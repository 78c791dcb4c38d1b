//! File upload lifecycle.
//!
//! Validates the selected file, submits it to the analysis service,
//! animates progress while waiting, and hands back the payload or a
//! user-facing error.

pub mod client;
pub mod controller;
pub mod error;
pub mod file;
pub mod progress;
pub mod terminal;

pub use client::{HttpAnalysisClient, ServiceSettings};
pub use controller::{ControllerSettings, UploadController};
pub use error::UploadError;
pub use file::UploadFile;

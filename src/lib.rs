//! A Rust session and transfer layer for tethered cameras.
//!
//! The crate sits on top of a gphoto-style camera driver (see [`driver::Driver`])
//! and takes care of the parts around it: session lifecycle, the asynchronous
//! event wait, chunked streaming of files held in driver memory, storage
//! listing and navigation of the device configuration tree.
//!
//! The driver itself is an external collaborator. An in-memory implementation
//! is provided in [`mock`] for tests and demos.
//!
//! ## Example
//!
//! More examples are provided in the `demos/` folder.
//!
//! ```no_run
//! use std::{io::Read as _, sync::Arc};
//! use tether_cam::{cam::Camera, mock::MockDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cam = Camera::new(Arc::new(MockDriver::new()));
//!
//!     cam.init()?;
//!
//!     println!("Camera model: {}", cam.model()?);
//!
//!     let path = cam.trigger_capture_to_file()?;
//!     let mut image = Vec::new();
//!     cam.file_reader(&path.folder, &path.name)?.read_to_end(&mut image)?;
//!
//!     cam.exit()?;
//!
//!     Ok(())
//! }
//! ```

/// Default values (chunk ceiling, timeouts, path conventions).
pub mod consts;

/// Session settings.
pub mod settings;

/// Native result codes and their translation.
pub mod result;

/// The boundary to the camera driver.
pub mod driver;

/// In-memory driver used by tests and demos.
pub mod mock;

/// Folder and file listing decoding.
pub mod listing;

/// Camera events and the asynchronous wait.
pub mod event;

/// Files held in driver memory and the chunked reader over them.
pub mod reader;

/// Configuration widget tree.
pub mod widget;

/// Contains the main camera session struct.
pub mod cam;

/// Contains various convenience methods for interacting with the camera.
pub mod util;

use widget::WidgetKind;

/// Crate-specific error enum.
/// Every function interacting with the camera returns a Result enum with this error type.
#[derive(thiserror::Error, Debug)]
pub enum CamError {
    #[error("Device error {code}: {message}")]
    Device { code: i32, message: String },

    #[error("No configuration widget named {name:?} ({message})")]
    WidgetNotFound {
        name: String,
        code: i32,
        message: String,
    },

    #[error("Read attempted on a closed file stream")]
    StreamClosed,

    #[error("A {shape} value cannot be assigned to a {kind:?} widget")]
    ValueMismatch { kind: WidgetKind, shape: &'static str },

    #[error("Text value contains an interior NUL byte")]
    InteriorNul,

    #[error("Only the root widget of a configuration tree can be freed")]
    NotRoot,

    #[error("Configuration widget was already freed")]
    WidgetFreed,

    #[error("Camera session is not initialized")]
    NotInitialized,

    #[error("Camera session is already initialized")]
    AlreadyInitialized,

    #[error("Camera session was closed")]
    SessionClosed,

    #[error("Event wait ended without delivering an event")]
    EventWaitAborted,

    #[error("Invalid storage path {0:?}")]
    InvalidPath(String),
}

impl CamError {
    /// Native result code behind the error, if it came from the driver.
    pub fn code(&self) -> Option<i32> {
        match self {
            CamError::Device { code, .. } | CamError::WidgetNotFound { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type CamResult<T> = Result<T, CamError>;

use std::fmt;

use crate::{
    CamError, CamResult,
    driver::{Driver, NativeResult},
};

/// Integer result code returned by every call into the driver.
///
/// `0` means success, negative values are failures. The numbering follows the
/// gphoto2 result tables (port-level codes from `-1` to `-99`, camera-level
/// codes from `-100` on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const OK: Self = Self(0);
    pub const ERROR: Self = Self(-1);
    pub const BAD_PARAMETERS: Self = Self(-2);
    pub const NO_MEMORY: Self = Self(-3);
    pub const LIBRARY: Self = Self(-4);
    pub const UNKNOWN_PORT: Self = Self(-5);
    pub const NOT_SUPPORTED: Self = Self(-6);
    pub const IO: Self = Self(-7);
    pub const FIXED_LIMIT_EXCEEDED: Self = Self(-8);
    pub const TIMEOUT: Self = Self(-10);
    pub const IO_SUPPORTED_SERIAL: Self = Self(-20);
    pub const IO_SUPPORTED_USB: Self = Self(-21);
    pub const IO_INIT: Self = Self(-31);
    pub const IO_READ: Self = Self(-34);
    pub const IO_WRITE: Self = Self(-35);
    pub const IO_UPDATE: Self = Self(-37);
    pub const IO_SERIAL_SPEED: Self = Self(-41);
    pub const IO_USB_CLEAR_HALT: Self = Self(-51);
    pub const IO_USB_FIND: Self = Self(-52);
    pub const IO_USB_CLAIM: Self = Self(-53);
    pub const IO_LOCK: Self = Self(-60);
    pub const HAL: Self = Self(-70);
    pub const CORRUPTED_DATA: Self = Self(-102);
    pub const FILE_EXISTS: Self = Self(-103);
    pub const MODEL_NOT_FOUND: Self = Self(-105);
    pub const DIRECTORY_NOT_FOUND: Self = Self(-107);
    pub const FILE_NOT_FOUND: Self = Self(-108);
    pub const DIRECTORY_EXISTS: Self = Self(-109);
    pub const CAMERA_BUSY: Self = Self(-110);
    pub const PATH_NOT_ABSOLUTE: Self = Self(-111);
    pub const CANCEL: Self = Self(-112);
    pub const CAMERA_ERROR: Self = Self(-113);
    pub const OS_FAILURE: Self = Self(-114);
    pub const NO_SPACE: Self = Self(-115);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Human readable description of the code.
    pub fn as_str(self) -> &'static str {
        result_as_string(self.0)
    }

    /// Builds [`CamError::Device`] with the message `driver` reports for this code.
    pub fn into_error(self, driver: &dyn Driver) -> CamError {
        CamError::Device {
            code: self.0,
            message: driver.result_as_string(self).to_owned(),
        }
    }

    /// Turns a non-zero code into [`CamError::Device`] carrying the message
    /// from the built-in table.
    pub fn into_result(self) -> CamResult<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(CamError::from(self))
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.0)
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl From<ResultCode> for CamError {
    fn from(code: ResultCode) -> Self {
        CamError::Device {
            code: code.0,
            message: code.as_str().to_owned(),
        }
    }
}

/// Converts native failures into crate errors, translated by the driver that reported them.
pub(crate) trait Translate<T> {
    fn translate(self, driver: &dyn Driver) -> CamResult<T>;
}

impl<T> Translate<T> for NativeResult<T> {
    fn translate(self, driver: &dyn Driver) -> CamResult<T> {
        self.map_err(|code| code.into_error(driver))
    }
}

/// Translates a raw driver result code into its description.
pub fn result_as_string(code: i32) -> &'static str {
    match code {
        0 => "No error",
        -1 => "Unspecified error",
        -2 => "Bad parameters",
        -3 => "Out of memory",
        -4 => "Error loading a library",
        -5 => "Unknown port",
        -6 => "Unsupported operation",
        -7 => "I/O problem",
        -8 => "Fixed limit exceeded",
        -10 => "Timeout reading from or writing to the port",
        -20 => "Serial port not supported",
        -21 => "USB port not supported",
        -31 => "Error initializing the port",
        -34 => "Error reading from the port",
        -35 => "Error writing to the port",
        -37 => "Error updating the port settings",
        -41 => "Error setting the serial port speed",
        -51 => "Error clearing a halt condition on the USB port",
        -52 => "Could not find the requested device on the USB port",
        -53 => "Could not claim the USB device",
        -60 => "Could not lock the device",
        -70 => "libhal error",
        -102 => "Corrupted data",
        -103 => "File exists",
        -105 => "Unknown model",
        -107 => "Directory not found",
        -108 => "File not found",
        -109 => "Directory exists",
        -110 => "I/O in progress",
        -111 => "Path not absolute",
        -112 => "Cancelled",
        -113 => "Unspecified camera error",
        -114 => "OS failure",
        -115 => "Not enough space",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_not_an_error() {
        assert!(ResultCode::OK.into_result().is_ok());
        assert_eq!(result_as_string(0), "No error");
    }

    #[test]
    fn failure_carries_translated_message() {
        let err = ResultCode::FILE_NOT_FOUND.into_result().unwrap_err();

        match err {
            CamError::Device { code, message } => {
                assert_eq!(code, -108);
                assert_eq!(message, "File not found");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn driver_translation_is_used() {
        let driver =
            crate::mock::MockDriver::new().with_message(ResultCode::IO_USB_FIND, "no camera on the bus");
        let res: NativeResult<()> = Err(ResultCode::IO_USB_FIND);

        match res.translate(&driver) {
            Err(CamError::Device { code, message }) => {
                assert_eq!(code, -52);
                assert_eq!(message, "no camera on the bus");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn unlisted_codes_fall_back() {
        assert_eq!(ResultCode(-9999).as_str(), "Unknown error");
        assert_eq!(ResultCode::CANCEL.to_string(), "Cancelled (-112)");
    }
}

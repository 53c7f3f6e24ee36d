use crate::response::{RawDeviceResponse, ResponseFailure};
use derive_more::From;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

/// Alpaca representation of an error number.
///
/// Devices are free to send any integer here, so unlike a server-side error code this is not
/// range-checked on the way in.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, From)]
#[serde(transparent)]
pub struct ErrorCode(i32);

/// The starting value for driver-specific error numbers.
const DRIVER_BASE: i32 = 0x500;
/// The maximum value for error numbers.
const MAX: i32 = 0xFFF;

impl ErrorCode {
    /// Wrap a raw error number as received from the device.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Get the driver-specific error code.
    ///
    /// Returns `Ok` with `0`-based driver error code if this is a driver error.
    /// Returns `Err` with raw error code if not a driver error.
    pub const fn as_driver_error(self) -> Result<i32, i32> {
        if self.0 >= DRIVER_BASE && self.0 <= MAX {
            Ok(self.0 - DRIVER_BASE)
        } else {
            Err(self.0)
        }
    }

    /// Get the raw error code.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Whether this is the "no error" code.
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }
}

/// Error reported by the device in the response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Error {code} - {message}")]
pub struct DeviceError {
    /// Error number.
    #[serde(rename = "ErrorNumber")]
    pub code: ErrorCode,
    /// Error message.
    #[serde(rename = "ErrorMessage", default)]
    pub message: Cow<'static, str>,
}

impl DeviceError {
    /// Create a new `DeviceError` from given error code and a message.
    pub fn new(code: ErrorCode, message: impl std::fmt::Display) -> Self {
        Self {
            code,
            message: message.to_string().into(),
        }
    }

    /// Create a new error with unspecified error code and the given message.
    pub(crate) fn unspecified(message: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::UNSPECIFIED, message)
    }
}

macro_rules! alpaca_error_codes {
    ($(#[doc = $doc:literal] $name:ident = $value:literal,)*) => {
        impl ErrorCode {
            $(
                #[doc = $doc]
                pub const $name: Self = Self($value);
            )*
        }

        impl std::fmt::Debug for ErrorCode {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match *self {
                    $(
                        Self::$name => f.write_str(stringify!($name)),
                    )*
                    Self::UNSPECIFIED => f.write_str("UNSPECIFIED"),
                    _ => match self.as_driver_error() {
                        Ok(driver_code) => write!(f, "DRIVER_ERROR[{driver_code}]"),
                        Err(raw_code) => write!(f, "{raw_code:#X}"),
                    },
                }
            }
        }
    };
}

alpaca_error_codes! {
    #[doc = "Success"]
    OK = 0,
    #[doc = "The requested action is not implemented in this driver"]
    ACTION_NOT_IMPLEMENTED = 0x40C,
    #[doc = "The requested operation can not be undertaken at this time"]
    INVALID_OPERATION = 0x40B,
    #[doc = "Invalid value"]
    INVALID_VALUE = 0x401,
    #[doc = "The attempted operation is invalid because the mount is currently in a Parked state"]
    INVALID_WHILE_PARKED = 0x408,
    #[doc = "The attempted operation is invalid because the mount is currently in a Slaved state"]
    INVALID_WHILE_SLAVED = 0x409,
    #[doc = "The communications channel is not connected"]
    NOT_CONNECTED = 0x407,
    #[doc = "Property or method not implemented"]
    NOT_IMPLEMENTED = 0x400,
    #[doc = "A value has not been set"]
    VALUE_NOT_SET = 0x402,
}

impl ErrorCode {
    /// Unspecified error.
    ///
    /// Exists to map client-side problems, like an unparseable envelope, to the Alpaca error structure.
    pub const UNSPECIFIED: Self = Self(0x4FF);
}

// Devices and logs refer to error numbers in decimal (`Error 1025 - Invalid value`).
impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Failure of a shutter command.
///
/// Commands are all-or-nothing: any problem on the write path ends up here.
#[derive(Debug, Error)]
pub enum CommandFailure {
    /// The request never produced a response (connection refused, DNS, invalid endpoint, ...).
    #[error("Error occurred in \"{action}\" command to dome equipment: {error:#}")]
    Transport {
        /// Lowercased action name.
        action: String,
        /// Underlying transport error.
        error: eyre::Report,
    },

    /// The transport completed without producing any response object.
    #[error("Null response was returned")]
    NullResponse,

    /// The device answered but did not accept the command.
    #[error("Error occurred in \"{action}\" call to dome equipment: {failure}")]
    Rejected {
        /// Lowercased action name.
        action: String,
        /// How the response was classified.
        #[source]
        failure: ResponseFailure,
        /// The response as received.
        response: RawDeviceResponse,
    },
}

impl CommandFailure {
    /// The raw response, if the device produced one.
    pub const fn raw_response(&self) -> Option<&RawDeviceResponse> {
        match self {
            Self::Rejected { response, .. } => Some(response),
            Self::Transport { .. } | Self::NullResponse => None,
        }
    }

    /// The device-reported error, if the device rejected the command via the envelope.
    pub const fn device_error(&self) -> Option<&DeviceError> {
        match self {
            Self::Rejected {
                failure: ResponseFailure::Device(err),
                ..
            } => Some(err),
            _ => None,
        }
    }
}

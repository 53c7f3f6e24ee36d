use crate::errors::DeviceError;
use crate::transaction::ResponseTransaction;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

/// HTTP response from the device, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDeviceResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as received.
    pub body: Bytes,
}

impl RawDeviceResponse {
    /// Create a response from a status code and a body.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a `200 OK` response carrying the given JSON envelope.
    pub fn ok_json(envelope: &serde_json::Value) -> Self {
        Self::new(200, envelope.to_string())
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Transaction IDs echoed in the envelope, if any.
    pub(crate) fn transaction(&self) -> ResponseTransaction {
        serde_json::from_slice(&self.body).unwrap_or_default()
    }
}

/// Why a response couldn't be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseFailure {
    /// No response reached us.
    #[error("No response was received")]
    TransportFailure,

    /// Non-200 HTTP status.
    #[error("Error status {status} - {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// `ErrorNumber` in the envelope was non-zero.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(flatten)]
    error: DeviceError,
    #[serde(rename = "Value", default)]
    value: Option<serde_json::Value>,
}

/// Classify a device response.
///
/// `response` is `None` when the transport failed to produce one. On success returns the
/// envelope's `Value`, which is absent for commands. Every failure emits exactly one error event
/// tagged with `context`; whether it's fatal is up to the caller.
pub fn validate(
    response: Option<&RawDeviceResponse>,
    context: &str,
) -> Result<Option<serde_json::Value>, ResponseFailure> {
    let result = classify(response);

    if let Err(failure) = &result {
        tracing::error!(
            context,
            %failure,
            "Error occurred in {context:?} call to dome equipment",
        );
    }

    result
}

fn classify(
    response: Option<&RawDeviceResponse>,
) -> Result<Option<serde_json::Value>, ResponseFailure> {
    let response = response.ok_or(ResponseFailure::TransportFailure)?;

    if response.status != 200 {
        return Err(ResponseFailure::Http {
            status: response.status,
            body: response.text().into_owned(),
        });
    }

    let envelope = serde_json::from_slice::<Envelope>(&response.body).map_err(|err| {
        DeviceError::unspecified(format_args!("Invalid response envelope: {err}"))
    })?;

    if !envelope.error.code.is_ok() {
        return Err(envelope.error.into());
    }

    Ok(envelope.value)
}

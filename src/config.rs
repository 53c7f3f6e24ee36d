use eyre::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Where the dome lives and how to identify ourselves to it.
///
/// Deserializes from the camelCase keys used by observatory configuration files
/// (`baseUrl`, `deviceNumber`, `clientId`); other keys in the same object are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Device type root, e.g. `http://host:11111/api/v1/dome`.
    pub base_url: String,
    /// Alpaca device number.
    pub device_number: u32,
    /// Optional Alpaca `ClientID`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u32>,
}

impl DeviceConfig {
    /// Create a config without a client ID.
    pub fn new(base_url: impl Into<String>, device_number: u32) -> Self {
        Self {
            base_url: base_url.into(),
            device_number,
            client_id: None,
        }
    }

    /// Set the `ClientID` sent with every request.
    pub const fn with_client_id(mut self, client_id: u32) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// URL of `{baseUrl}/{deviceNumber}/{name}`.
    pub(crate) fn endpoint(&self, name: &str) -> eyre::Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .wrap_err_with(|| format!("Invalid dome base URL {:?}", self.base_url))?;

        {
            let Ok(mut segments) = url.path_segments_mut() else {
                eyre::bail!("{} is not a valid base URL", self.base_url);
            };
            let _ = segments
                .pop_if_empty()
                .push(&self.device_number.to_string())
                .push(name);
        }

        Ok(url)
    }
}

mod transport;

#[cfg(feature = "client")]
pub use transport::HttpTransport;
pub use transport::Transport;

use crate::transaction::{RequestTransaction, TransactionCounter};
use crate::{
    Command, CommandFailure, DeviceConfig, DomeStatus, RawDeviceResponse, ShutterState, validate,
};
use std::sync::Arc;
use tracing::Instrument;
use url::Url;

const STATUS_FAILED: &str = r#"Error occurred in "getStatus" call to dome equipment"#;

/// A GET with its transaction already issued.
#[derive(Debug)]
struct PreparedRead {
    path: &'static str,
    url: Url,
    transaction: RequestTransaction,
}

/// Client for a single Alpaca dome endpoint family.
///
/// Holds the transport and the transaction counter; the device itself is described by the
/// [`DeviceConfig`] passed to each call.
#[derive(Debug)]
pub struct DomeClient<T> {
    transport: T,
    counter: Arc<TransactionCounter>,
}

#[cfg(feature = "client")]
impl DomeClient<HttpTransport> {
    /// Create a client over a default HTTP transport and the process-wide counter.
    pub fn new_http() -> Self {
        Self::new(HttpTransport::new())
    }
}

impl<T: Transport> DomeClient<T> {
    /// Create a client sharing the process-wide [`TransactionCounter`].
    pub fn new(transport: T) -> Self {
        Self::with_counter(transport, TransactionCounter::global())
    }

    /// Create a client drawing transaction IDs from the given counter.
    pub const fn with_counter(transport: T, counter: Arc<TransactionCounter>) -> Self {
        Self { transport, counter }
    }

    /// The underlying transport.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The counter transaction IDs are drawn from.
    pub const fn counter(&self) -> &Arc<TransactionCounter> {
        &self.counter
    }

    fn prepare_read(&self, config: &DeviceConfig, path: &'static str) -> eyre::Result<PreparedRead> {
        let mut url = config.endpoint(path)?;
        let transaction = RequestTransaction::new(&self.counter, config.client_id);
        transaction.add_to_query(&mut url);
        Ok(PreparedRead {
            path,
            url,
            transaction,
        })
    }

    /// Perform a read, folding transport failures into a missing response.
    async fn read(&self, request: PreparedRead) -> Option<RawDeviceResponse> {
        let PreparedRead {
            path,
            url,
            transaction,
        } = request;

        let span = tracing::debug_span!(
            "Alpaca transaction",
            path,
            client_transaction_id = transaction.client_transaction_id,
            client_id = transaction.client_id,
        );

        async move {
            match self.transport.get(url).await {
                Ok(response) => {
                    if let Some(response) = &response {
                        response.transaction().check(transaction);
                    }
                    response
                }
                Err(err) => {
                    tracing::debug!(err = %format_args!("{err:#}"), "Read failed in transport");
                    None
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Read `cansetshutter` and `shutterstatus` and merge them.
    ///
    /// Both reads run concurrently. A read that fails in any way leaves its field as `None`
    /// instead of failing the whole call; the only error returned is when the requests
    /// can't be built at all (e.g. an invalid base URL).
    #[tracing::instrument(skip_all, fields(base_url = %config.base_url, device_number = config.device_number))]
    pub async fn get_status(&self, config: &DeviceConfig) -> eyre::Result<DomeStatus> {
        // Transaction IDs are issued here, in order, before either request is polled.
        let requests = self
            .prepare_read(config, "cansetshutter")
            .and_then(|can_set_shutter| {
                Ok((can_set_shutter, self.prepare_read(config, "shutterstatus")?))
            });

        let (can_set_shutter, shutter_status) = match requests {
            Ok(requests) => requests,
            Err(err) => {
                tracing::error!(err = %format_args!("{err:#}"), "{STATUS_FAILED}");
                return Err(err.wrap_err(STATUS_FAILED));
            }
        };

        let (can_set_shutter, shutter_status) =
            futures::join!(self.read(can_set_shutter), self.read(shutter_status));

        let can_set_shutter = match validate(can_set_shutter.as_ref(), "canSetShutter") {
            Ok(Some(serde_json::Value::Bool(value))) => Some(value),
            Ok(value) => {
                tracing::error!(
                    context = "canSetShutter",
                    ?value,
                    "Expected a boolean from dome equipment",
                );
                None
            }
            Err(_) => None,
        };

        let shutter_status = validate(shutter_status.as_ref(), "shutterStatus")
            .ok()
            .map(|value| ShutterState::from_value(value.as_ref()));

        Ok(DomeStatus {
            can_set_shutter,
            shutter_status,
        })
    }

    /// Send a shutter command and confirm the device accepted it.
    ///
    /// Completes as soon as the device acknowledges the command; the shutter may keep moving
    /// afterwards. Poll [`get_status`](Self::get_status) to observe completion.
    #[tracing::instrument(skip_all, fields(action = %command.action, base_url = %config.base_url, device_number = config.device_number))]
    pub async fn execute_command(
        &self,
        command: Command,
        config: &DeviceConfig,
    ) -> Result<(), CommandFailure> {
        let action = command.action.path();
        let transaction = RequestTransaction::new(&self.counter, config.client_id);

        let span = tracing::debug_span!(
            "Alpaca transaction",
            path = action,
            client_transaction_id = transaction.client_transaction_id,
            client_id = transaction.client_id,
        );

        async move {
            let response = match config.endpoint(action) {
                Ok(url) => self.transport.put(url, transaction.form_body()).await,
                Err(err) => Err(err),
            };

            let response = match response {
                Ok(Some(response)) => response,
                Ok(None) => {
                    tracing::error!(
                        context = action,
                        "Error occurred in {action:?} command to dome equipment: null response",
                    );
                    return Err(CommandFailure::NullResponse);
                }
                Err(error) => {
                    tracing::error!(
                        context = action,
                        err = %format_args!("{error:#}"),
                        "Error occurred in {action:?} command to dome equipment",
                    );
                    return Err(CommandFailure::Transport {
                        action: action.to_owned(),
                        error,
                    });
                }
            };

            response.transaction().check(transaction);

            match validate(Some(&response), action) {
                Ok(_) => Ok(()),
                Err(failure) => Err(CommandFailure::Rejected {
                    action: action.to_owned(),
                    failure,
                    response,
                }),
            }
        }
        .instrument(span)
        .await
    }
}

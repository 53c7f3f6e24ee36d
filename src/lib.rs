//! Client-side adapter for an observatory dome exposed over the ASCOM Alpaca API.
//!
//! The crate does two things:
//!
//! - [`DomeClient::get_status`] reads `cansetshutter` and `shutterstatus` concurrently and merges
//!   them into a [`DomeStatus`]. A failing read degrades to a `None` field instead of failing the
//!   whole status.
//! - [`DomeClient::execute_command`] sends `openshutter`, `closeshutter` or `abortslew` and
//!   confirms the device accepted it. Any failure is returned as a [`CommandFailure`].
//!
//! Both paths share the same response classification in [`validate`], and every outbound
//! request draws its `ClientTransactionID` from a [`TransactionCounter`].
//!
//! ```no_run
//! # async fn example() -> eyre::Result<()> {
//! use observe_dome::{Command, DeviceConfig, DomeClient, ShutterAction};
//!
//! let config = DeviceConfig::new("http://localhost:11111/api/v1/dome", 0);
//! let client = DomeClient::new_http();
//!
//! let status = client.get_status(&config).await?;
//! println!("{status:?}");
//!
//! client
//!     .execute_command(Command::new(ShutterAction::OpenShutter), &config)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod dome;
mod errors;
mod response;
mod transaction;

#[cfg(test)]
mod test;

#[cfg(feature = "client")]
pub use client::HttpTransport;
pub use client::{DomeClient, Transport};
pub use config::DeviceConfig;
pub use dome::{Command, DomeStatus, ShutterAction, ShutterState, UnknownAction};
pub use errors::{CommandFailure, DeviceError, ErrorCode};
pub use response::{RawDeviceResponse, ResponseFailure, validate};
pub use transaction::TransactionCounter;

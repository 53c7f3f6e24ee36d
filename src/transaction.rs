use serde::Deserialize;
use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, LazyLock};
use url::Url;

/// Source of `ClientTransactionID`s.
///
/// Starts at 1 and hands out each value exactly once. The counter is never reset and never
/// wraps: once `u32::MAX` has been issued it keeps returning `u32::MAX`, logging the exhaustion
/// once. [`TransactionCounter::global`] is shared by every client created with the default
/// constructors; tests and embedders can inject their own.
#[derive(Debug)]
pub struct TransactionCounter {
    next: AtomicU32,
    exhausted: AtomicBool,
}

impl TransactionCounter {
    /// Create a fresh counter starting at 1.
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    const fn starting_at(next: u32) -> Self {
        Self {
            next: AtomicU32::new(next),
            exhausted: AtomicBool::new(false),
        }
    }

    /// The process-wide counter.
    pub fn global() -> Arc<Self> {
        static GLOBAL: LazyLock<Arc<TransactionCounter>> =
            LazyLock::new(|| Arc::new(TransactionCounter::new()));

        Arc::clone(&GLOBAL)
    }

    /// Return the current value and advance the counter.
    pub fn next_id(&self) -> u32 {
        match self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
        {
            Ok(id) => id,
            Err(id) => {
                if !self.exhausted.swap(true, Ordering::Relaxed) {
                    tracing::error!(id, "ClientTransactionID space exhausted, repeating the last ID");
                }
                id
            }
        }
    }

    /// The value the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for TransactionCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction fields attached to a single outbound request.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RequestTransaction {
    pub(crate) client_transaction_id: u32,
    pub(crate) client_id: Option<u32>,
}

impl RequestTransaction {
    /// Issue the next ID. A client ID of 0 means "not set" in Alpaca and is left out.
    pub(crate) fn new(counter: &TransactionCounter, client_id: Option<u32>) -> Self {
        Self {
            client_transaction_id: counter.next_id(),
            client_id: client_id.filter(|&client_id| client_id != 0),
        }
    }

    /// Append the GET-style query parameters.
    pub(crate) fn add_to_query(self, url: &mut Url) {
        let mut query = url.query_pairs_mut();
        let _ = query.append_pair(
            "clienttransactionid",
            &self.client_transaction_id.to_string(),
        );
        if let Some(client_id) = self.client_id {
            let _ = query.append_pair("clientid", &client_id.to_string());
        }
    }

    /// Build the PUT-style form body.
    ///
    /// Alpaca devices only accept this exact `key=value&key=value` shape.
    pub(crate) fn form_body(self) -> String {
        let mut body = format!("ClientTransactionID={}", self.client_transaction_id);
        if let Some(client_id) = self.client_id {
            let _ = write!(body, "&ClientId={client_id}");
        }
        body
    }
}

/// Transaction fields echoed back by the device, when it bothers to.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct ResponseTransaction {
    #[serde(rename = "ClientTransactionID", default)]
    pub(crate) client_transaction_id: Option<u32>,
    #[serde(rename = "ServerTransactionID", default)]
    pub(crate) server_transaction_id: Option<u32>,
}

impl ResponseTransaction {
    pub(crate) fn check(self, request: RequestTransaction) {
        tracing::debug!(
            server_transaction_id = self.server_transaction_id,
            "Received response",
        );

        match self.client_transaction_id {
            // Devices that don't track client transactions echo 0.
            Some(received) if received != 0 && received != request.client_transaction_id => {
                tracing::warn!(
                    sent = request.client_transaction_id,
                    received,
                    "ClientTransactionID mismatch",
                );
            }
            _ => {}
        }
    }
}

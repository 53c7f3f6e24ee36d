
pub(crate) use mock::{Method, MockTransport};

use crate::RawDeviceResponse;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// `200 OK` with a full Alpaca envelope, the way devices answer.
pub(crate) fn envelope(
    value: Option<serde_json::Value>,
    error_number: i32,
    error_message: &str,
) -> RawDeviceResponse {
    let mut envelope = serde_json::json!({
        "ClientTransactionID": 0,
        "ServerTransactionID": 0,
        "ErrorNumber": error_number,
        "ErrorMessage": error_message,
    });
    if let Some(value) = value {
        envelope["Value"] = value;
    }
    RawDeviceResponse::ok_json(&envelope)
}

struct ErrorCounter(Arc<AtomicUsize>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::ERROR {
            let _ = self.0.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Counts error events emitted on the current thread while alive.
///
/// Works for `#[tokio::test]`s as long as they stay on the default current-thread runtime.
pub(crate) struct ErrorEvents {
    count: Arc<AtomicUsize>,
    _guard: DefaultGuard,
}

impl ErrorEvents {
    pub(crate) fn capture() -> Self {
        let count = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(Arc::clone(&count)));
        Self {
            count,
            _guard: tracing::subscriber::set_default(subscriber),
        }
    }

    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

pub(crate) fn count_error_events<R>(f: impl FnOnce() -> R) -> (usize, R) {
    let events = ErrorEvents::capture();
    let result = f();
    (events.count(), result)
}

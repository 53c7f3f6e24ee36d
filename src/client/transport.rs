use crate::RawDeviceResponse;
use url::Url;

/// HTTP capability the dome client calls into.
///
/// `Err` means the request failed before any response was produced (connection refused,
/// DNS, TLS, ...). `Ok(None)` means the call completed but yielded no response object.
/// Non-2xx statuses are *not* errors here; they're returned as-is for classification.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET request.
    async fn get(&self, url: Url) -> eyre::Result<Option<RawDeviceResponse>>;

    /// Perform a PUT request with a form-encoded body.
    async fn put(&self, url: Url, body: String) -> eyre::Result<Option<RawDeviceResponse>>;
}

#[cfg(feature = "client")]
mod http {
    use super::Transport;
    use crate::RawDeviceResponse;
    use mime::Mime;
    use reqwest::header::CONTENT_TYPE;
    use url::Url;

    /// [`Transport`] backed by `reqwest`.
    #[derive(Debug, Clone, Default)]
    pub struct HttpTransport {
        inner: reqwest::Client,
    }

    impl HttpTransport {
        /// Create a transport with a default `reqwest` client.
        pub fn new() -> Self {
            Self::default()
        }

        /// Use a preconfigured `reqwest` client (timeouts, proxies, ...).
        pub const fn from_client(inner: reqwest::Client) -> Self {
            Self { inner }
        }

        async fn send(
            &self,
            request: reqwest::RequestBuilder,
        ) -> eyre::Result<Option<RawDeviceResponse>> {
            let response = request.send().await.inspect_err(|err| {
                tracing::debug!(%err, "Alpaca request failed");
            })?;

            let status = response.status();

            if status.is_success() {
                let mime_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<Mime>().ok());

                if mime_type
                    .as_ref()
                    .is_none_or(|mime_type| mime_type.essence_str() != mime::APPLICATION_JSON.as_ref())
                {
                    tracing::warn!(?mime_type, "Expected JSON response");
                }
            }

            let body = response.bytes().await?;

            Ok(Some(RawDeviceResponse::new(status.as_u16(), body)))
        }
    }

    #[async_trait::async_trait]
    impl Transport for HttpTransport {
        async fn get(&self, url: Url) -> eyre::Result<Option<RawDeviceResponse>> {
            self.send(self.inner.get(url)).await
        }

        async fn put(&self, url: Url, body: String) -> eyre::Result<Option<RawDeviceResponse>> {
            self.send(
                self.inner
                    .put(url)
                    .header(CONTENT_TYPE, mime::APPLICATION_WWW_FORM_URLENCODED.as_ref())
                    .body(body),
            )
            .await
        }
    }
}

#[cfg(feature = "client")]
pub use http::HttpTransport;

#[cfg(all(test, feature = "client"))]
mod tests {
    use super::{HttpTransport, Transport};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use url::Url;

    const HEAD_END: &[u8] = b"\r\n\r\n";

    fn head_len(request: &[u8]) -> Option<usize> {
        request
            .windows(HEAD_END.len())
            .position(|window| window == HEAD_END)
            .map(|pos| pos + HEAD_END.len())
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse().ok())
            .unwrap_or_default()
    }

    async fn answer_once(listener: TcpListener, response: String) -> eyre::Result<String> {
        let (mut stream, _) = listener.accept().await?;
        let mut request = Vec::new();
        let mut chunk = [0_u8; 1024];

        loop {
            let read = stream.read(&mut chunk).await?;
            eyre::ensure!(read != 0, "Connection closed mid-request");
            request.extend_from_slice(&chunk[..read]);

            if let Some(head_len) = head_len(&request) {
                let head = String::from_utf8_lossy(&request[..head_len]);
                if request.len() >= head_len + content_length(&head) {
                    break;
                }
            }
        }

        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(String::from_utf8(request)?)
    }

    /// Accept a single connection on a local port, answer it with a canned HTTP/1.1 response
    /// and hand back the raw request text.
    async fn serve_once(
        status_line: &str,
        content_type: &str,
        body: &str,
    ) -> eyre::Result<(Url, JoinHandle<eyre::Result<String>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = Url::parse(&format!("http://{}/api/v1/dome/", listener.local_addr()?))?;
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let server = tokio::spawn(answer_once(listener, response));

        Ok((base_url, server))
    }

    fn split_request(request: &str) -> (&str, &str) {
        request.split_once("\r\n\r\n").unwrap_or((request, ""))
    }

    #[tokio::test]
    async fn put_sends_form_body_verbatim() -> eyre::Result<()> {
        let envelope = r#"{"ErrorNumber":0,"ErrorMessage":"","ClientTransactionID":7}"#;
        let (base_url, server) = serve_once("200 OK", "application/json", envelope).await?;

        let response = HttpTransport::new()
            .put(
                base_url.join("0/openshutter")?,
                "ClientTransactionID=7&ClientId=12".to_owned(),
            )
            .await?;
        let request = server.await??;

        let Some(response) = response else {
            panic!("expected a response");
        };
        assert_eq!(response.status, 200);
        assert_eq!(response.text(), envelope);

        let (head, body) = split_request(&request);
        assert!(
            head.starts_with("PUT /api/v1/dome/0/openshutter HTTP/1.1\r\n"),
            "{head}"
        );
        assert!(
            head.to_ascii_lowercase()
                .contains("\r\ncontent-type: application/x-www-form-urlencoded\r\n"),
            "{head}"
        );
        assert_eq!(body, "ClientTransactionID=7&ClientId=12");
        Ok(())
    }

    #[tokio::test]
    async fn get_keeps_query_parameters() -> eyre::Result<()> {
        let envelope = r#"{"ErrorNumber":0,"ErrorMessage":"","Value":true}"#;
        let (base_url, server) = serve_once("200 OK", "application/json", envelope).await?;

        let response = HttpTransport::new()
            .get(base_url.join("0/cansetshutter?clienttransactionid=1&clientid=5")?)
            .await?;
        let request = server.await??;

        assert_eq!(response.map(|response| response.status), Some(200));
        assert!(
            request.starts_with("GET /api/v1/dome/0/cansetshutter?clienttransactionid=1&clientid=5 HTTP/1.1\r\n"),
            "{request}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn error_statuses_are_responses() -> eyre::Result<()> {
        let message = "MockException: you did something incorrect.";
        let (base_url, server) = serve_once("400 Bad Request", "text/plain", message).await?;

        let response = HttpTransport::new()
            .put(base_url.join("0/closeshutter")?, "ClientTransactionID=1".to_owned())
            .await?;
        let _ = server.await??;

        let Some(response) = response else {
            panic!("expected a response");
        };
        assert_eq!(response.status, 400);
        assert_eq!(response.text(), message);
        Ok(())
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() -> eyre::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let result = HttpTransport::new()
            .get(Url::parse(&format!("http://{addr}/api/v1/dome/0/shutterstatus"))?)
            .await;

        assert!(result.is_err(), "{result:?}");
        Ok(())
    }

    #[cfg(feature = "client-tls")]
    #[tokio::test]
    async fn https_urls_reach_the_network() -> eyre::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);

        let Err(err) = HttpTransport::new()
            .get(Url::parse(&format!("https://{addr}/api/v1/dome/0/shutterstatus"))?)
            .await
        else {
            panic!("nothing is listening on {addr}");
        };

        let err = format!("{err:?}");
        assert!(!err.contains("scheme is not http"), "{err}");
        Ok(())
    }
}

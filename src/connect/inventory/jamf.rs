//! Jamf Classic API inventory client.
//!
//! One HTTPS `GET` per lookup with basic auth:
//!
//! ```text
//! https://{base}/JSSResource/computers/name/{form-urlencoded name}
//! Accept: application/json
//! ```
//!
//! The request runs on the blocking pool (ureq is synchronous) and is raced
//! against the client timeout and the run's cancellation token, so an
//! interrupt is never swallowed by a stalled request.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ureq::Agent;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};

use crate::connect::error::InventoryError;
use crate::connect::types::InventoryRecord;

use super::credentials::Credentials;
use super::document::parse_computer_document;
use super::traits::Inventory;

/// Resource collection holding computer records.
const COMPUTERS_BY_NAME: &str = "JSSResource/computers/name";

/// Maximum accepted response body size (2 MB).
const MAX_RESPONSE_SIZE: u64 = 2 * 1024 * 1024;

/// Build the lookup URL for `name` under `base`.
///
/// A base without a scheme is served over HTTPS.
pub(crate) fn computer_url(base: &str, name: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let base = if base.starts_with("https://") || base.starts_with("http://") {
        base.to_string()
    } else {
        format!("https://{}", base)
    };
    let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{}/{}/{}", base, COMPUTERS_BY_NAME, encoded)
}

/// `Authorization` header value for basic auth.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
}

/// Create an HTTP agent configured with native-tls and a global timeout.
///
/// Idle connections are not kept, so every lookup opens its own.
fn agent(timeout: Duration) -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(timeout))
        .max_idle_connections(0)
        .max_idle_connections_per_host(0)
        .build()
        .into()
}

/// Perform the blocking request and return the response body.
fn fetch_body(agent: &Agent, url: &str, auth: &str, name: &str) -> Result<String, InventoryError> {
    let response = agent
        .get(url)
        .header("Accept", "application/json")
        .header("Authorization", auth)
        .header("User-Agent", "sshdash")
        .call();

    match response {
        Ok(mut response) => response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_SIZE)
            .read_to_string()
            .map_err(|e| InventoryError::LookupFailed(format!("failed to read response: {}", e))),
        Err(ureq::Error::StatusCode(404)) => Err(InventoryError::NotFound(name.to_string())),
        Err(ureq::Error::StatusCode(code)) => Err(InventoryError::LookupFailed(format!(
            "server answered HTTP {}",
            code
        ))),
        Err(e) => Err(InventoryError::LookupFailed(e.to_string())),
    }
}

/// Inventory client for a Jamf Pro server.
///
/// Constructed once per run, after credentials were acquired, and passed by
/// reference to the resolver.
pub struct JamfClient {
    base_url: String,
    auth_header: String,
    timeout: Duration,
    agent: Agent,
    cancel: CancellationToken,
}

impl JamfClient {
    pub fn new(credentials: &Credentials, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            base_url: credentials.url.clone(),
            auth_header: basic_auth(&credentials.username, &credentials.password),
            timeout,
            agent: agent(timeout),
            cancel,
        }
    }
}

#[async_trait]
impl Inventory for JamfClient {
    async fn fetch_computer(&self, name: &str) -> Result<InventoryRecord, InventoryError> {
        let url = computer_url(&self.base_url, name);
        debug!("Fetching inventory record from {}", url);

        let agent = self.agent.clone();
        let auth = self.auth_header.clone();
        let owned_name = name.to_string();
        let request = tokio::task::spawn_blocking(move || {
            fetch_body(&agent, &url, &auth, &owned_name)
        });

        let body = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => {
                return Err(InventoryError::LookupFailed("lookup cancelled".to_string()));
            }

            result = tokio::time::timeout(self.timeout, request) => match result {
                Ok(Ok(body)) => body?,
                Ok(Err(join_error)) => {
                    warn!("Inventory request task failed: {}", join_error);
                    return Err(InventoryError::LookupFailed(join_error.to_string()));
                }
                Err(_elapsed) => {
                    return Err(InventoryError::LookupFailed(format!(
                        "no answer within {:?}",
                        self.timeout
                    )));
                }
            }
        };

        parse_computer_document(name, &body)
    }

    fn name(&self) -> &'static str {
        "jamf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod url_building {
        use super::*;

        #[test]
        fn test_bare_host_gets_https() {
            assert_eq!(
                computer_url("jss.example.com", "mac-01"),
                "https://jss.example.com/JSSResource/computers/name/mac-01"
            );
        }

        #[test]
        fn test_trailing_slash_is_dropped() {
            assert_eq!(
                computer_url("jss.example.com:8443/", "mac-01"),
                "https://jss.example.com:8443/JSSResource/computers/name/mac-01"
            );
        }

        #[test]
        fn test_explicit_scheme_is_kept() {
            assert_eq!(
                computer_url("http://localhost:8080", "mac-01"),
                "http://localhost:8080/JSSResource/computers/name/mac-01"
            );
        }

        #[test]
        fn test_name_is_form_urlencoded() {
            assert_eq!(
                computer_url("jss.example.com", "Alice's MacBook/Pro"),
                "https://jss.example.com/JSSResource/computers/name/Alice%27s+MacBook%2FPro"
            );
        }
    }

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth("api", "secret"), "Basic YXBpOnNlY3JldA==");
    }

    #[tokio::test]
    async fn test_cancelled_lookup_fails() {
        let credentials = Credentials {
            url: "jss.invalid".to_string(),
            username: "api".to_string(),
            password: "secret".to_string(),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let client = JamfClient::new(&credentials, Duration::from_secs(5), cancel);

        let result = client.fetch_computer("mac-01").await;
        assert_eq!(
            result,
            Err(InventoryError::LookupFailed("lookup cancelled".to_string()))
        );
        assert_eq!(client.name(), "jamf");
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (release, held) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            // Keep the connection open without ever answering.
            let _ = held.await;
        });

        let credentials = Credentials {
            url: format!("http://127.0.0.1:{}", port),
            username: "api".to_string(),
            password: "secret".to_string(),
        };
        let client =
            JamfClient::new(&credentials, Duration::from_millis(300), CancellationToken::new());

        let started = std::time::Instant::now();
        let result = client.fetch_computer("mac-01").await;
        let elapsed = started.elapsed();
        drop(release);

        assert!(
            matches!(result, Err(InventoryError::LookupFailed(_))),
            "unexpected {:?}",
            result
        );
        assert!(elapsed < Duration::from_secs(3), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_error_page_from_local_server_is_lookup_failed() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let body = "<html><body><p>Error: Unauthorized</p></body></html>";
            let reply = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        let credentials = Credentials {
            url: format!("http://127.0.0.1:{}", port),
            username: "api".to_string(),
            password: "secret".to_string(),
        };
        let client = JamfClient::new(&credentials, Duration::from_secs(5), CancellationToken::new());

        let result = client.fetch_computer("mac-01").await;
        assert_eq!(
            result,
            Err(InventoryError::LookupFailed("Error: Unauthorized".to_string()))
        );
    }

    #[tokio::test]
    async fn test_not_found_from_local_server() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let reply = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
            let _ = socket.write_all(reply.as_bytes()).await;
        });

        let credentials = Credentials {
            url: format!("http://127.0.0.1:{}", port),
            username: "api".to_string(),
            password: "secret".to_string(),
        };
        let client = JamfClient::new(&credentials, Duration::from_secs(5), CancellationToken::new());

        let result = client.fetch_computer("ghost").await;
        assert_eq!(result, Err(InventoryError::NotFound("ghost".to_string())));
    }
}

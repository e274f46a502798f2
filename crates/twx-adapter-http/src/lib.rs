//! HTTP transport for the remote platform.
//!
//! Every request carries the `appKey` credential header and JSON
//! `Accept`/`Content-Type` headers. The key is held as a [`SecretString`],
//! marked sensitive on the header, and scrubbed from any error text.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use twx_core::config::ConfigError;
use twx_core::{HttpMethod, RemoteConfig, ResolvedRequest};
use twx_runtime::{RemoteResponse, RemoteTransport, TransportError};

/// Paths probed by [`HttpTransport::ping`], in order.
pub const PING_PATHS: &[&str] = &["/SystemInformation", "/Resources/EntityServices"];

/// `appKey`; header names are case-insensitive and sent lowercase.
const APP_KEY_HEADER: &str = "appkey";
const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone)]
pub struct HttpTransportOptions {
    pub timeout: Duration,
    pub verify_tls: bool,
    pub user_agent: String,
}

impl Default for HttpTransportOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            verify_tls: true,
            user_agent: concat!("twx/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HttpTransportError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("application key contains characters not allowed in an HTTP header")]
    InvalidAppKey,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReport {
    pub path: String,
    pub status: u16,
}

impl PingReport {
    /// `false` when the server answered 401/403.
    pub fn authenticated(&self) -> bool {
        self.status == 200
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    app_key: SecretString,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("app_key", &REDACTED)
            .finish()
    }
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        app_key: SecretString,
        options: HttpTransportOptions,
    ) -> Result<Self, HttpTransportError> {
        let mut key = HeaderValue::from_str(app_key.expose_secret())
            .map_err(|_| HttpTransportError::InvalidAppKey)?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(APP_KEY_HEADER), key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !options.verify_tls {
            tracing::warn!("TLS certificate verification is disabled");
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .danger_accept_invalid_certs(!options.verify_tls)
            .user_agent(options.user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_key,
        })
    }

    /// Build from configuration, reading the key from the environment.
    pub fn from_config(config: &RemoteConfig) -> Result<Self, HttpTransportError> {
        let base_url = config.base_url()?;
        let app_key = config.resolve_app_key()?;
        Self::new(
            &base_url,
            app_key,
            HttpTransportOptions {
                timeout: config.timeout(),
                verify_tls: config.verify_tls,
                ..Default::default()
            },
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn redact(&self, text: &str) -> String {
        redact(text, self.app_key.expose_secret())
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connection(self.redact(&e.to_string()))
        } else {
            TransportError::Other(self.redact(&e.to_string()))
        }
    }

    /// Check that the platform answers. 401 and 403 count as reachable.
    pub async fn ping(&self) -> Result<PingReport, TransportError> {
        let mut last_error = TransportError::Other("no probe endpoints".into());

        for path in PING_PATHS {
            tracing::debug!(path, "probing remote");
            match self.client.get(self.url(path)).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if matches!(status, 200 | 401 | 403) {
                        tracing::info!(path, status, "remote reachable");
                        return Ok(PingReport {
                            path: path.to_string(),
                            status,
                        });
                    }
                    tracing::debug!(path, status, "probe returned unexpected status");
                    last_error = TransportError::Other(format!("{path} returned HTTP {status}"));
                }
                Err(e) => {
                    last_error = self.map_error(e);
                    tracing::debug!(path, error = %last_error, "probe failed");
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl RemoteTransport for HttpTransport {
    async fn send(&self, request: &ResolvedRequest) -> Result<RemoteResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        tracing::debug!(method = %request.method, path = %request.path, "sending request");

        let mut builder = self.client.request(method, self.url(&request.path));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.map_error(e))?;

        tracing::debug!(method = %request.method, path = %request.path, status, "response received");

        Ok(RemoteResponse {
            status,
            body: parse_body(&self.redact(&text)),
        })
    }
}

/// JSON body, or the raw text as a JSON string, or `null` when empty.
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Replace every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn transport(base_url: &str, timeout: Duration) -> HttpTransport {
        HttpTransport::new(
            base_url,
            SecretString::from("s3cr3t-key".to_string()),
            HttpTransportOptions {
                timeout,
                ..Default::default()
            },
        )
        .unwrap()
    }

    /// Accept one connection, capture the request head and reply with
    /// `response`.
    async fn serve_once(response: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{addr}/Thingworx"), handle)
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("key=abc&x=abc", "abc"), "key=[REDACTED]&x=[REDACTED]");
        assert_eq!(redact("nothing here", ""), "nothing here");
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("Thing already exists"), json!("Thing already exists"));
    }

    #[test]
    fn test_debug_hides_key() {
        let t = transport("https://twx.example.com/Thingworx/", Duration::from_secs(1));
        let text = format!("{t:?}");
        assert!(!text.contains("s3cr3t-key"));
        assert_eq!(t.base_url(), "https://twx.example.com/Thingworx");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = RemoteConfig {
            base_url: Some("https://twx.example.com/Thingworx".into()),
            app_key_env: "TWX_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let err = HttpTransport::from_config(&config).unwrap_err();
        assert!(matches!(err, HttpTransportError::Config(_)));
    }

    #[tokio::test]
    async fn test_send_carries_headers_and_body() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}",
        )
        .await;
        let t = transport(&base, Duration::from_secs(5));

        let response = t
            .send(&ResolvedRequest {
                method: HttpMethod::Put,
                path: "/Things/pump/Properties/speed".into(),
                body: Some(json!({"speed": 3})),
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"ok": true}));

        let head = server.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("put /thingworx/things/pump/properties/speed http/1.1"));
        assert!(head.contains("appkey: s3cr3t-key"));
        assert!(head.contains("accept: application/json"));
        assert!(head.contains("content-type: application/json"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned_not_raised() {
        let (base, _server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 14\r\nConnection: close\r\n\r\nInternal error",
        )
        .await;
        let t = transport(&base, Duration::from_secs(5));

        let response = t
            .send(&ResolvedRequest {
                method: HttpMethod::Post,
                path: "/Things/pump/Services/EnableThing".into(),
                body: None,
            })
            .await
            .unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!("Internal error"));
    }

    #[tokio::test]
    async fn test_slow_server_is_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        let t = transport(&format!("http://{addr}"), Duration::from_millis(200));

        let err = t
            .send(&ResolvedRequest {
                method: HttpMethod::Get,
                path: "/SystemInformation".into(),
                body: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn test_ping_accepts_unauthorized() {
        let (base, _server) = serve_once(
            "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let report = transport(&base, Duration::from_secs(5)).ping().await.unwrap();
        assert_eq!(report.path, "/SystemInformation");
        assert_eq!(report.status, 401);
        assert!(!report.authenticated());
    }
}

//! Remote vault client
//!
//! Pushes and pulls the encrypted store image against a user-supplied
//! HTTP endpoint (typically a jsonbin-style paste service or a small
//! self-hosted handler). The remote is untrusted by design: it only ever
//! sees the opaque [`SyncPayload::data`] string, never a key and never
//! plaintext.
//!
//! Server dialects vary, so the client is deliberately lenient: uploads
//! try `PUT` and fall back to `POST`, and downloads accept the payload
//! either bare or wrapped in a `{"record": ...}` envelope.

use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SyncError, SyncResult};

/// Version tag stamped on every upload. Bump only with a migration path.
pub const SYNC_VERSION: &str = "1.0";

/// The envelope actually sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    /// Opaque store image; ciphertext except for legacy plaintext entries.
    pub data: String,
    /// Upload time, Unix milliseconds.
    pub timestamp: i64,
    pub version: String,
}

impl SyncPayload {
    pub fn new(data: String) -> Self {
        SyncPayload {
            data,
            timestamp: Utc::now().timestamp_millis(),
            version: SYNC_VERSION.to_string(),
        }
    }
}

/// Record of the last successful push or pull, kept in the vault metadata
/// so a later pull can detect that the remote has gone backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncManifest {
    /// Timestamp of the synced payload, Unix milliseconds.
    pub last_modified: i64,
    /// Device that produced the payload.
    pub device_id: String,
    pub version: String,
}

/// Sync section of the user's config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    pub endpoint_url: Option<String>,
    /// Either a bare token (sent as `Authorization: Bearer <token>`) or a
    /// full `Header-Name: value` pair.
    pub api_key: Option<String>,
}

/// How the configured API key turns into a request header.
#[derive(Debug, Clone, PartialEq)]
enum AuthHeader {
    /// `X-Access-Key: abc123` style, for services with custom auth headers.
    Named { name: String, value: String },
    /// Bare token, sent as a standard bearer credential.
    Bearer(String),
}

fn parse_auth_header(api_key: &str) -> AuthHeader {
    if let Some((name, value)) = api_key.split_once(':') {
        let name = name.trim_end();
        let value = value.trim_start();
        let name_ok =
            !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
        if name_ok && !value.is_empty() {
            return AuthHeader::Named {
                name: name.to_string(),
                value: value.to_string(),
            };
        }
    }

    let token = if api_key.starts_with("Bearer ") {
        api_key.to_string()
    } else {
        format!("Bearer {api_key}")
    };
    AuthHeader::Bearer(token)
}

/// HTTP client for one configured endpoint.
pub struct RemoteVault {
    client: reqwest::Client,
    endpoint: String,
    auth: AuthHeader,
}

impl RemoteVault {
    /// Build a client from config. Sync must be fully configured: both an
    /// endpoint and an API key.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let endpoint = config
            .endpoint_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SyncError::NoEndpoint)?;
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(SyncError::MissingApiKey)?;

        Ok(RemoteVault {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            auth: parse_auth_header(api_key),
        })
    }

    /// Upload a payload. Tries `PUT` (replace-in-place services) first and
    /// retries once as `POST` for endpoints that only accept creates.
    pub async fn push(&self, payload: &SyncPayload) -> SyncResult<()> {
        let response = self.request(Method::PUT).json(payload).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        tracing::debug!(status = %response.status(), "PUT rejected, retrying as POST");
        let response = self.request(Method::POST).json(payload).send().await?;
        if response.status().is_success() {
            return Ok(());
        }

        Err(SyncError::Rejected {
            status: response.status().as_u16(),
        })
    }

    /// Download the latest payload.
    ///
    /// `Ok(None)` when the endpoint has nothing yet (404) or returns a
    /// body that is not a sync payload; both are normal for a freshly
    /// configured remote.
    pub async fn pull(&self) -> SyncResult<Option<SyncPayload>> {
        let response = self.request(Method::GET).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SyncError::Rejected {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        Ok(extract_payload(&body))
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let builder = self.client.request(method, &self.endpoint);
        match &self.auth {
            AuthHeader::Named { name, value } => builder.header(name.as_str(), value.as_str()),
            AuthHeader::Bearer(token) => builder.header(AUTHORIZATION, token.as_str()),
        }
    }
}

/// Pick the payload out of a response body, unwrapping the `record`
/// envelope some services add. Anything without a string `data` and a
/// numeric `timestamp` is not a payload.
fn extract_payload(body: &Value) -> Option<SyncPayload> {
    let candidate = body.get("record").unwrap_or(body);

    let data = candidate.get("data")?.as_str()?;
    let timestamp = candidate.get("timestamp")?;
    let timestamp = timestamp
        .as_i64()
        .or_else(|| timestamp.as_f64().map(|t| t as i64))?;
    let version = candidate
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or(SYNC_VERSION);

    Some(SyncPayload {
        data: data.to_string(),
        timestamp,
        version: version.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload = SyncPayload {
            data: "{\"ledger\":\"enc_v1:...\"}".into(),
            timestamp: 1_710_000_000_000,
            version: SYNC_VERSION.into(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""timestamp":1710000000000"#));
        assert!(json.contains(r#""version":"1.0""#));

        let manifest = SyncManifest {
            last_modified: payload.timestamp,
            device_id: "dev-1".into(),
            version: SYNC_VERSION.into(),
        };
        assert!(serde_json::to_string(&manifest)
            .unwrap()
            .contains(r#""lastModified""#));
    }

    #[test]
    fn test_auth_header_named() {
        assert_eq!(
            parse_auth_header("X-Access-Key: abc$123"),
            AuthHeader::Named {
                name: "X-Access-Key".into(),
                value: "abc$123".into(),
            }
        );
        assert_eq!(
            parse_auth_header("X-Master-Key:secret"),
            AuthHeader::Named {
                name: "X-Master-Key".into(),
                value: "secret".into(),
            }
        );
    }

    #[test]
    fn test_auth_header_bearer() {
        assert_eq!(
            parse_auth_header("tok123"),
            AuthHeader::Bearer("Bearer tok123".into())
        );
        // Already-prefixed tokens are not double-wrapped.
        assert_eq!(
            parse_auth_header("Bearer tok123"),
            AuthHeader::Bearer("Bearer tok123".into())
        );
        // A name with spaces is not a header name; the colon is part of
        // the token.
        assert_eq!(
            parse_auth_header("not a header: x"),
            AuthHeader::Bearer("Bearer not a header: x".into())
        );
    }

    #[test]
    fn test_extract_payload_bare_and_wrapped() {
        let bare = json!({"data": "blob", "timestamp": 17, "version": "1.0"});
        let wrapped = json!({"record": {"data": "blob", "timestamp": 17}});

        let payload = extract_payload(&bare).unwrap();
        assert_eq!(payload.data, "blob");
        assert_eq!(payload.timestamp, 17);

        let payload = extract_payload(&wrapped).unwrap();
        assert_eq!(payload.data, "blob");
        assert_eq!(payload.version, SYNC_VERSION, "missing version defaults");
    }

    #[test]
    fn test_extract_payload_rejects_wrong_shapes() {
        assert_eq!(extract_payload(&json!({})), None);
        assert_eq!(extract_payload(&json!("data")), None);
        assert_eq!(
            extract_payload(&json!({"data": 42, "timestamp": 17})),
            None
        );
        assert_eq!(
            extract_payload(&json!({"data": "blob", "timestamp": "17"})),
            None
        );
        // Fractional timestamps truncate rather than fail.
        assert_eq!(
            extract_payload(&json!({"data": "blob", "timestamp": 17.9}))
                .unwrap()
                .timestamp,
            17
        );
    }

    #[test]
    fn test_new_requires_full_config() {
        let disabled = SyncConfig::default();
        assert!(matches!(
            RemoteVault::new(&disabled),
            Err(SyncError::NoEndpoint)
        ));

        let keyless = SyncConfig {
            enabled: true,
            endpoint_url: Some("https://example.test/vault".into()),
            api_key: Some("   ".into()),
        };
        assert!(matches!(
            RemoteVault::new(&keyless),
            Err(SyncError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_pull_from_unreachable_endpoint_is_http_error() {
        let config = SyncConfig {
            enabled: true,
            endpoint_url: Some("http://127.0.0.1:1/vault".into()),
            api_key: Some("tok".into()),
        };
        let vault = RemoteVault::new(&config).unwrap();

        assert!(matches!(vault.pull().await, Err(SyncError::Http(_))));
    }
}

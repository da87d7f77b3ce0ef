//! Connection options and configuration.
//!
//! Provides a builder-style interface for everything needed to open a
//! session: target address, authorization and project headers, protocol
//! version, timeouts and the runtime the session's tasks run on.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use interactive_rpc::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .address("wss://interactive.example.com/gameClient")
//!     .authorization("Bearer abc123")
//!     .project_version_id(42489)
//!     .share_code("rheo1hre")
//!     .call_timeout(Duration::from_secs(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::runtime::Handle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a call awaiting its reply.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Protocol version sent in `X-Protocol-Version`.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2.0";

/// Header carrying the bearer token.
const HEADER_AUTHORIZATION: &str = "Authorization";

/// Header carrying the project version id.
const HEADER_VERSION: &str = "X-Interactive-Version";

/// Header carrying the project share code.
const HEADER_SHARECODE: &str = "X-Interactive-Sharecode";

/// Header carrying the protocol version.
const HEADER_PROTOCOL_VERSION: &str = "X-Protocol-Version";

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Configuration for opening a [`Connection`](super::Connection).
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// WebSocket address (`ws://` or `wss://`).
    address: Option<String>,

    /// Value of the `Authorization` header, e.g. `Bearer <token>`.
    authorization: Option<String>,

    /// Project version id.
    project_version_id: Option<String>,

    /// Project share code.
    share_code: Option<String>,

    /// Protocol version string.
    protocol_version: String,

    /// Additional handshake headers, applied before the well-known ones.
    extra_headers: Vec<(String, String)>,

    /// Timeout applied by `Connection::call`.
    call_timeout: Duration,

    /// Upper bound on waiting for `hello`. `None` waits indefinitely.
    handshake_timeout: Option<Duration>,

    /// Runtime the receive loop and pump tasks are spawned on.
    runtime: Option<Handle>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with default settings and no address.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            address: None,
            authorization: None,
            project_version_id: None,
            share_code: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            extra_headers: Vec::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            handshake_timeout: None,
            runtime: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the WebSocket address to connect to.
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the `Authorization` header value.
    #[inline]
    #[must_use]
    pub fn authorization(mut self, authorization: impl Into<String>) -> Self {
        self.authorization = Some(authorization.into());
        self
    }

    /// Sets the project version id.
    #[inline]
    #[must_use]
    pub fn project_version_id(mut self, id: impl ToString) -> Self {
        self.project_version_id = Some(id.to_string());
        self
    }

    /// Sets the project share code.
    #[inline]
    #[must_use]
    pub fn share_code(mut self, code: impl Into<String>) -> Self {
        self.share_code = Some(code.into());
        self
    }

    /// Overrides the protocol version string.
    #[inline]
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.protocol_version = version.into();
        self
    }

    /// Adds a custom handshake header.
    #[inline]
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Sets the default call timeout.
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Bounds the wait for the `hello` handshake.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Sets the runtime that session tasks are spawned on.
    ///
    /// Defaults to the runtime that opens the connection.
    #[inline]
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl ConnectionOptions {
    /// Returns the configured call timeout.
    #[inline]
    #[must_use]
    pub fn get_call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Returns the configured handshake timeout.
    #[inline]
    #[must_use]
    pub fn get_handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout
    }

    /// Returns the handshake headers in the order they are applied.
    ///
    /// Well-known headers come last, so they override custom headers of
    /// the same name.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = self.extra_headers.clone();

        if let Some(ref authorization) = self.authorization {
            headers.push((HEADER_AUTHORIZATION.to_string(), authorization.clone()));
        }
        if let Some(ref version) = self.project_version_id {
            headers.push((HEADER_VERSION.to_string(), version.clone()));
        }
        if let Some(ref code) = self.share_code {
            headers.push((HEADER_SHARECODE.to_string(), code.clone()));
        }
        headers.push((
            HEADER_PROTOCOL_VERSION.to_string(),
            self.protocol_version.clone(),
        ));

        headers
    }

    /// Resolves the runtime handle for spawning session tasks.
    pub(crate) fn runtime_handle(&self) -> Result<Handle> {
        match self.runtime {
            Some(ref handle) => Ok(handle.clone()),
            None => Handle::try_current()
                .map_err(|e| Error::config(format!("No tokio runtime available: {e}"))),
        }
    }

    /// Builds the WebSocket client request with all handshake headers.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the address is missing or invalid
    /// - [`Error::Config`] if a header name or value is invalid
    pub fn request(&self) -> Result<Request> {
        let url = self.validate_address()?;
        let mut request = url.as_str().into_client_request()?;

        let headers = request.headers_mut();
        for (name, value) in self.headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|e| Error::config(format!("Invalid value for header {name}: {e}")))?;
            headers.insert(header_name, header_value);
        }

        Ok(request)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Validates the address configuration.
    fn validate_address(&self) -> Result<Url> {
        let address = self.address.as_deref().ok_or_else(|| {
            Error::config(
                "Connection address is required. Use .address() to set it.\n\
                 Example: ConnectionOptions::new().address(\"wss://host/gameClient\")",
            )
        })?;

        let url = Url::parse(address)
            .map_err(|e| Error::config(format!("Invalid address {address:?}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(Error::config(format!(
                "Unsupported address scheme {scheme:?}, expected ws or wss"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::new();

        assert_eq!(options.get_call_timeout(), DEFAULT_CALL_TIMEOUT);
        assert!(options.get_handshake_timeout().is_none());
        assert_eq!(
            options.headers(),
            vec![("X-Protocol-Version".to_string(), "2.0".to_string())]
        );
    }

    #[test]
    fn test_headers_order() {
        let options = ConnectionOptions::new()
            .header("X-Custom", "1")
            .authorization("Bearer token")
            .project_version_id(1234)
            .share_code("abc")
            .protocol_version("2.1");

        let names: Vec<_> = options.headers().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            [
                "X-Custom",
                "Authorization",
                "X-Interactive-Version",
                "X-Interactive-Sharecode",
                "X-Protocol-Version",
            ]
        );
    }

    #[test]
    fn test_request_carries_headers() {
        let request = ConnectionOptions::new()
            .address("wss://interactive.example.com/gameClient")
            .authorization("Bearer token")
            .project_version_id(42489)
            .request()
            .expect("valid request");

        assert_eq!(request.uri().host(), Some("interactive.example.com"));
        let headers = request.headers();
        assert_eq!(headers["Authorization"], "Bearer token");
        assert_eq!(headers["X-Interactive-Version"], "42489");
        assert_eq!(headers["X-Protocol-Version"], "2.0");
        assert!(headers.get("X-Interactive-Sharecode").is_none());
    }

    #[test]
    fn test_custom_header_overridden() {
        let request = ConnectionOptions::new()
            .address("ws://127.0.0.1:9000")
            .header("X-Protocol-Version", "0.1")
            .request()
            .expect("valid request");

        assert_eq!(request.headers()["X-Protocol-Version"], "2.0");
    }

    #[test]
    fn test_missing_address() {
        let err = ConnectionOptions::new().request().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_scheme() {
        let err = ConnectionOptions::new()
            .address("https://example.com")
            .request()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_header_value() {
        let err = ConnectionOptions::new()
            .address("ws://127.0.0.1:9000")
            .authorization("Bearer \n injected")
            .request()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_runtime_handle_outside_runtime() {
        assert!(ConnectionOptions::new().runtime_handle().is_err());
    }

    #[tokio::test]
    async fn test_runtime_handle_inside_runtime() {
        assert!(ConnectionOptions::new().runtime_handle().is_ok());
    }
}

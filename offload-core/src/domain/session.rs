//! Session domain types

use serde::{Deserialize, Serialize};

/// Separator placed between the platform token and the secondary session id
pub const SECONDARY_SEPARATOR: &str = ",JSESSIONID=";

/// Logon parameters supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: host.into(),
            port,
            use_tls: false,
        }
    }

    /// Switches the session to HTTPS
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Base URL of the scheduler web application, always ending in `/`
    pub fn server_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}:{}/platform/", scheme, self.host, self.port)
    }
}

/// An authentication token bound to one scheduler URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub server_url: String,
    pub token: String,
    pub secondary_token: Option<String>,
}

impl SessionToken {
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: token.into(),
            secondary_token: None,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary_token = Some(secondary.into());
        self
    }

    /// Whether the server URL selects TLS
    pub fn uses_tls(&self) -> bool {
        self.server_url.to_ascii_lowercase().starts_with("https")
    }

    /// Serializes the token into the two-line file format
    ///
    /// `server_url\ntoken[,JSESSIONID=secondary]`
    pub fn to_file_contents(&self) -> String {
        let mut out = format!("{}\n{}", self.server_url, self.token);
        if let Some(secondary) = &self.secondary_token {
            out.push_str(SECONDARY_SEPARATOR);
            out.push_str(secondary);
        }
        out
    }

    /// Parses the two-line file format
    ///
    /// Returns `None` for anything that is not a complete token: a missing
    /// second line, an empty URL or an empty token.
    pub fn from_file_contents(contents: &str) -> Option<Self> {
        let mut lines = contents.split('\n');
        let server_url = lines.next()?.trim();
        let raw = lines.next()?.trim_end_matches('\r');
        if server_url.is_empty() || raw.is_empty() {
            return None;
        }

        let (token, secondary_token) = match raw.split_once(SECONDARY_SEPARATOR) {
            Some((token, secondary)) => (token, Some(secondary.to_string())),
            None => (raw, None),
        };
        if token.is_empty() {
            return None;
        }

        Some(Self {
            server_url: server_url.to_string(),
            token: token.to_string(),
            secondary_token,
        })
    }

    /// Cookie header value sent with every authenticated call
    ///
    /// Double quotes inside the token are not legal in a cookie value and are
    /// rewritten to the `#quote#` escape the scheduler expects.
    pub fn cookie(&self) -> String {
        let mut value = self.token.clone();
        if let Some(secondary) = &self.secondary_token {
            value.push_str(SECONDARY_SEPARATOR);
            value.push_str(secondary);
        }
        format!("platform_token={}", value.replace('"', "#quote#"))
    }
}

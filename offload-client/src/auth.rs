//! Session endpoints: logon and logout

use offload_core::{Credentials, SessionToken};
use tracing::info;

use crate::codec::xml;
use crate::error::{ClientError, Result};
use crate::transport::WireRequest;
use crate::{ACCEPT_MULTIPLE, SchedulerClient};

impl SchedulerClient {
    // =============================================================================
    // Session
    // =============================================================================

    /// Log on and return the issued token
    ///
    /// The token is not persisted here; callers store it through
    /// [`crate::SessionStore`]. The password is escaped before it is placed
    /// in the XML body.
    ///
    /// # Errors
    /// - `Rejected` for bad credentials or a non-200 answer
    /// - `Unreachable` / `MissingCaBundle` for transport failures
    pub async fn logon(&self, credentials: &Credentials) -> Result<SessionToken> {
        let server_url = credentials.server_url();
        let url = Self::endpoint(&server_url, "logon/");
        let body = format!(
            "<User><name>{}</name> <pass>{}</pass> </User>",
            credentials.username,
            xml::escape(&credentials.password)
        );

        let request = WireRequest::get(url)
            .header("Content-Type", "application/xml")
            .header("Cookie", "platform_token=")
            .header("Accept", ACCEPT_MULTIPLE)
            .header("Accept-Language", "en-us")
            .body(body)
            .timeout(self.request_timeout());
        let response = self.send(request).await?;

        if !response.is_ok() {
            return Err(ClientError::Rejected(format!(
                "Failed to logon the server \"{}\".",
                credentials.host
            )));
        }

        let text = std::str::from_utf8(&response.body)
            .map_err(|e| ClientError::Rejected(format!("Failed to decode the content: {}", e)))?;

        match xml::field(text, "token") {
            Some(token) if !token.is_empty() => {
                let mut session = SessionToken::new(server_url, token);
                if let Some(secondary) = xml::field(text, "jtoken").filter(|j| !j.is_empty()) {
                    session = session.with_secondary(secondary);
                }
                info!("Logged on to {} as {}", credentials.host, credentials.username);
                Ok(session)
            }
            _ => Err(ClientError::Rejected(
                xml::field(text, "errMsg").unwrap_or_else(|| "No token in logon response".into()),
            )),
        }
    }

    /// Log out the session on the server side
    ///
    /// The server answers a plain `ok` on success.
    pub async fn logout(&self, token: &SessionToken) -> Result<()> {
        let url = Self::endpoint(&token.server_url, "logout/");
        let request = WireRequest::get(url)
            .header("Content-Type", "text/plain")
            .header("Cookie", token.cookie())
            .header("Accept", ACCEPT_MULTIPLE)
            .header("Accept-Language", "en-us")
            .timeout(self.request_timeout());
        let response = self.send(request).await?;

        if !response.is_ok() {
            return Err(ClientError::action_failed("logout", "Failed to logout"));
        }

        let text = String::from_utf8_lossy(&response.body);
        if text.trim() == "ok" {
            Ok(())
        } else {
            Err(ClientError::from_remote_message("logout", text.trim()))
        }
    }
}

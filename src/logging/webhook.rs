//! HTTP webhook alert transport.

use std::time::Duration;

use serde::Serialize;

use super::{Alert, AlertSession, AlertTransport, RemoteSettings, SinkError};

/// Posts each alert as JSON to `settings.endpoint`.
///
/// A configured `secret` is sent as a bearer token; `username` travels in the
/// payload as the sender.
#[derive(Debug, Default, Clone)]
pub struct WebhookTransport;

impl WebhookTransport {
    pub fn new() -> Self {
        Self
    }
}

pub struct WebhookSession {
    agent: ureq::Agent,
    endpoint: String,
    sender: Option<String>,
    authorization: Option<String>,
}

#[derive(Serialize)]
struct Payload<'a> {
    #[serde(flatten)]
    alert: &'a Alert,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender: Option<&'a str>,
}

impl AlertTransport for WebhookTransport {
    type Session = WebhookSession;

    fn open(
        &mut self,
        settings: &RemoteSettings,
        timeout: Duration,
    ) -> Result<WebhookSession, SinkError> {
        if settings.endpoint.is_empty() {
            return Err(SinkError::Rejected("alert endpoint is empty".into()));
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(WebhookSession {
            agent,
            endpoint: settings.endpoint.clone(),
            sender: None,
            authorization: None,
        })
    }
}

impl AlertSession for WebhookSession {
    fn authenticate(
        &mut self,
        username: Option<&str>,
        secret: Option<&str>,
    ) -> Result<(), SinkError> {
        self.sender = username.map(str::to_string);
        self.authorization = secret.map(|token| format!("Bearer {token}"));
        Ok(())
    }

    fn transmit(&mut self, alert: &Alert) -> Result<(), SinkError> {
        let mut request = self.agent.post(&self.endpoint);
        if let Some(authorization) = &self.authorization {
            request = request.set("Authorization", authorization);
        }
        let payload = Payload {
            alert,
            sender: self.sender.as_deref(),
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| SinkError::Transport(format!("encode alert: {e}")))?;

        match request.send_json(body) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, _)) => Err(SinkError::Rejected(format!(
                "{} answered HTTP {code}",
                self.endpoint
            ))),
            Err(e) => Err(SinkError::Transport(e.to_string())),
        }
    }

    fn close(self) -> Result<(), SinkError> {
        Ok(())
    }
}

//! Outbound delivery of issued codes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::info;

use crate::APP_USER_AGENT;

/// SendGrid v3 mail send endpoint.
const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Fixed sender address for passcode emails.
const EMAIL_FROM: &str = "no-reply@sesamo.dev";

/// Out-of-band delivery of a code to the user.
///
/// Delivery failure must fail the whole request: the record is already
/// persisted at that point, but the user never received the code. The
/// undelivered record is harmless since the next request overwrites it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &str, code: &str) -> Result<()>;
}

/// Delivers codes through the SendGrid HTTP API.
pub struct SendgridNotifier {
    client: Client,
    api_key: SecretString,
}

impl SendgridNotifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_key: SecretString) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Failed to build email client")?;

        Ok(Self { client, api_key })
    }
}

fn message_body(email: &str, code: &str) -> Value {
    json!({
        "personalizations": [{ "to": [{ "email": email }] }],
        "from": { "email": EMAIL_FROM },
        "subject": "Your Verify Code",
        "content": [
            {
                "type": "text/plain",
                "value": format!("Your verification code is {code}"),
            },
            {
                "type": "text/html",
                "value": format!("<strong>Your verification code is {code}</strong>"),
            },
        ],
    })
}

#[async_trait]
impl Notifier for SendgridNotifier {
    async fn send(&self, email: &str, code: &str) -> Result<()> {
        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&message_body(email, code))
            .send()
            .await
            .context("failed to reach email provider")?;

        let status = response.status();
        if !status.is_success() {
            bail!("email provider rejected the message: {status}");
        }

        Ok(())
    }
}

/// Test sender that logs instead of sending real email.
/// The code itself is never logged.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &str, _code: &str) -> Result<()> {
        info!(to_email = %email, "otp email send stub");
        Ok(())
    }
}

//! The OTP lifecycle state machine.
//!
//! Per email address the service moves through three states, observed
//! indirectly through the store: no pending code, `PendingOtp(code,
//! expiry)`, and consumed. Issuing a new code unconditionally overwrites
//! the pending one (latest request wins), verification consumes the record
//! exactly once, and there is no stored "expired" state; expiry is a
//! predicate evaluated at verification time. Stale records self-invalidate
//! on read and are overwritten by the next request, so no background sweep
//! is needed.

pub mod error;
pub mod generator;
pub mod identity;
pub mod notifier;
pub mod store;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

use self::error::OtpError;
use self::identity::IdentityProvider;
use self::notifier::Notifier;
use self::store::OtpStore;

/// Validity window for an issued code.
pub const OTP_TTL_MS: i64 = 10 * 60 * 1000;

/// Orchestrates code generation, storage, delivery, verification, and
/// credential minting. Holds no state between calls; everything lives in
/// the store, so each invocation is an independent unit of work.
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    notifier: Arc<dyn Notifier>,
    identities: Arc<dyn IdentityProvider>,
}

impl OtpService {
    #[must_use]
    pub fn new(
        store: Arc<dyn OtpStore>,
        notifier: Arc<dyn Notifier>,
        identities: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            store,
            notifier,
            identities,
        }
    }

    /// Issue a fresh code for `email`, replacing any pending one, and send
    /// it out-of-band.
    ///
    /// # Errors
    /// `InvalidArgument` when the email is missing, `Internal` when the
    /// store or the notifier fails.
    pub async fn request_otp(&self, email: &str) -> Result<(), OtpError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(OtpError::invalid_argument(
                "The function must be called with an email.",
            ));
        }

        let code = generator::generate_code();
        let expires_at_ms = now_ms().saturating_add(OTP_TTL_MS);

        // Persist before notifying: a stored-but-undelivered record is
        // harmless, the next request overwrites it and it goes stale after
        // the validity window.
        if let Err(err) = self.store.put(&email, &code, expires_at_ms).await {
            error!("Failed to store OTP for {email}: {err}");
            return Err(OtpError::internal("Unable to send OTP."));
        }

        if let Err(err) = self.notifier.send(&email, &code).await {
            error!("Failed to send OTP email to {email}: {err}");
            return Err(OtpError::internal("Unable to send OTP."));
        }

        info!(email = %email, "OTP issued");
        Ok(())
    }

    /// Verify a submitted code, consume it, and mint a bearer credential
    /// for the identity behind `email`, creating that identity on first
    /// use with its email marked verified.
    ///
    /// # Errors
    /// `InvalidArgument` on missing input or code mismatch, `NotFound`
    /// when no record is pending, `FailedPrecondition` when the record has
    /// expired, `Internal` on any dependency failure.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<String, OtpError> {
        let email = normalize_email(email);
        if email.is_empty() || code.is_empty() {
            return Err(OtpError::invalid_argument("Email and code are required."));
        }

        let record = match self.store.get(&email).await {
            Ok(record) => record,
            Err(err) => {
                error!("Failed to fetch OTP record for {email}: {err}");
                return Err(OtpError::internal("Unable to verify OTP."));
            }
        };
        let Some(record) = record else {
            return Err(OtpError::not_found("No OTP request found for this email."));
        };

        if now_ms() > record.expires_at_ms {
            // Left in place: no verification can ever succeed against it
            // and the next request overwrites it.
            return Err(OtpError::failed_precondition("OTP has expired."));
        }

        if record.code != code {
            return Err(OtpError::invalid_argument("Invalid OTP."));
        }

        // Conditional delete so only one concurrent verifier consumes the
        // code; the loser sees the record as already gone.
        let consumed = match self.store.delete_if_matches(&email, code).await {
            Ok(consumed) => consumed,
            Err(err) => {
                error!("Failed to consume OTP record for {email}: {err}");
                return Err(OtpError::internal("Unable to verify OTP."));
            }
        };
        if !consumed {
            warn!(email = %email, "OTP consumed concurrently");
            return Err(OtpError::not_found("No OTP request found for this email."));
        }

        let identity = match self.identities.find_by_email(&email).await {
            Ok(Some(identity)) => identity,
            Ok(None) => match self.identities.create(&email, true).await {
                Ok(identity) => {
                    info!(email = %email, identity_id = %identity.id, "identity created");
                    identity
                }
                Err(err) => {
                    error!("Failed to create identity for {email}: {err}");
                    return Err(OtpError::internal("Unable to verify OTP."));
                }
            },
            Err(err) => {
                error!("Failed to lookup identity for {email}: {err}");
                return Err(OtpError::internal("Unable to verify OTP."));
            }
        };

        let token = match self.identities.mint_credential(identity.id).await {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to mint credential for {email}: {err}");
                return Err(OtpError::internal("Unable to verify OTP."));
            }
        };

        info!(email = %email, identity_id = %identity.id, "OTP verified");
        Ok(token)
    }
}

/// Normalize an email before it is used as the store key.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Current time, milliseconds since epoch.
fn now_ms() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => match i64::try_from(elapsed.as_millis()) {
            Ok(ms) => ms,
            Err(err) => {
                warn!("system time does not fit in i64 milliseconds: {err}");
                i64::MAX
            }
        },
        Err(err) => {
            warn!("system time is before the epoch: {err}");
            0
        }
    }
}

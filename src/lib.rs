//! # Sesamo (Email OTP Authentication)
//!
//! `sesamo` authenticates users by proving control of an email address:
//! it issues a short-lived one-time passcode, delivers it out-of-band, and
//! exchanges a successful verification for a durable bearer credential,
//! provisioning the identity on first use.
//!
//! ## OTP lifecycle
//!
//! Per email address the service observes three states through the store:
//! no pending code, a pending `(code, expiry)` pair, and consumed. Issuing
//! a new code unconditionally replaces the pending one (latest request
//! wins), verification consumes the record exactly once, and expired
//! records simply go stale until the next request overwrites them.
//!
//! ## Verified email implies a trusted identity
//!
//! Whoever holds the mailbox and just proved it via OTP may claim the
//! existing identity for that address or provision a fresh one. New
//! identities are created with `email_verified = true`.

pub mod api;
pub mod cli;
pub mod otp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::warn;

use super::config::AuthConfig;

/// Bcrypt cost factor for hashing the configured admin credentials.
const BCRYPT_COST: u32 = 10;

/// Basic-auth realm presented in the `WWW-Authenticate` challenge.
pub const REALM: &str = "Depot Admin";

/// HTTP Basic authentication for the admin routes.
///
/// The configured user and password are bcrypt-hashed at startup; requests
/// are verified with `bcrypt::verify`, which is inherently constant-time.
/// If either credential is unset the provider runs in locked mode and
/// denies every admin request rather than falling open.
#[derive(Debug)]
pub struct BasicAuth {
    user_hash: Option<String>,
    password_hash: Option<String>,
}

/// Outcome of checking an `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid,
    /// Header absent or not `Basic`.
    Missing,
    /// Header present but the credentials do not match (or locked mode).
    Invalid,
}

impl BasicAuth {
    pub fn new(config: &AuthConfig) -> Self {
        let user = config.admin_user.trim();
        let password = config.admin_password.trim();

        if user.is_empty() || password.is_empty() {
            warn!("basic-auth credentials not configured, admin routes are locked");
            return Self {
                user_hash: None,
                password_hash: None,
            };
        }

        Self {
            user_hash: bcrypt::hash(user, BCRYPT_COST).ok(),
            password_hash: bcrypt::hash(password, BCRYPT_COST).ok(),
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn check_header(&self, header: Option<&str>) -> CredentialStatus {
        let encoded = match header.and_then(|h| h.strip_prefix("Basic ")) {
            Some(e) => e.trim(),
            None => return CredentialStatus::Missing,
        };

        let decoded = match BASE64.decode(encoded) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(_) => return CredentialStatus::Invalid,
            },
            Err(_) => return CredentialStatus::Invalid,
        };

        let (user, password) = match decoded.split_once(':') {
            Some((u, p)) => (u.trim(), p.trim()),
            None => return CredentialStatus::Invalid,
        };

        if self.verify(user, password) {
            CredentialStatus::Valid
        } else {
            CredentialStatus::Invalid
        }
    }

    fn verify(&self, user: &str, password: &str) -> bool {
        let (Some(user_hash), Some(password_hash)) = (&self.user_hash, &self.password_hash) else {
            // Locked mode: nothing configured, nothing accepted.
            return false;
        };

        bcrypt::verify(user, user_hash).unwrap_or(false)
            && bcrypt::verify(password, password_hash).unwrap_or(false)
    }

    /// True when no credentials are configured and everything is denied.
    pub fn is_locked(&self) -> bool {
        self.user_hash.is_none() || self.password_hash.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(user: &str, password: &str) -> BasicAuth {
        BasicAuth::new(&AuthConfig {
            admin_user: user.to_string(),
            admin_password: password.to_string(),
        })
    }

    fn basic_header(user: &str, password: &str) -> String {
        format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
    }

    #[test]
    fn test_valid_credentials_accepted() {
        let auth = provider("admin", "hunter2");
        let header = basic_header("admin", "hunter2");
        assert_eq!(auth.check_header(Some(&header)), CredentialStatus::Valid);
    }

    #[test]
    fn test_wrong_password_rejected() {
        let auth = provider("admin", "hunter2");
        let header = basic_header("admin", "wrong");
        assert_eq!(auth.check_header(Some(&header)), CredentialStatus::Invalid);
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let auth = provider("admin", "hunter2");
        assert_eq!(auth.check_header(None), CredentialStatus::Missing);
        assert_eq!(
            auth.check_header(Some("Bearer abc")),
            CredentialStatus::Missing
        );
        assert_eq!(
            auth.check_header(Some("Basic not!base64")),
            CredentialStatus::Invalid
        );
        // Decodes but has no colon separator.
        let no_colon = format!("Basic {}", BASE64.encode("adminhunter2"));
        assert_eq!(
            auth.check_header(Some(&no_colon)),
            CredentialStatus::Invalid
        );
    }

    #[test]
    fn test_surrounding_whitespace_tolerated() {
        let auth = provider("admin", "hunter2");
        let header = format!("Basic {}", BASE64.encode(" admin : hunter2 "));
        assert_eq!(auth.check_header(Some(&header)), CredentialStatus::Valid);
    }

    #[test]
    fn test_locked_mode_denies_everything() {
        let auth = provider("", "");
        assert!(auth.is_locked());
        let header = basic_header("anyone", "anything");
        assert_eq!(auth.check_header(Some(&header)), CredentialStatus::Invalid);
    }
}

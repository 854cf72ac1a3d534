//! Credential storage and constant-time HTTP Basic auth verification
//! (§3 Credential, §4.3, §8 Testable Property 3).

use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A username/password pair guarding a route. Compared via constant-time
/// equality of SHA-256 digests, never via the raw strings.
#[derive(Clone)]
pub struct Credential {
    pub user: String,
    pub password: String,
    pub disabled: bool,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("disabled", &self.disabled)
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone, Copy)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("invalid Basic auth encoding")]
    InvalidBasicAuth,
    #[error("invalid username or password")]
    Mismatch,
}

/// The text the gateway sends back over the text-frame control channel on
/// auth failure (§4.3, §8 property 3): the same message regardless of
/// which of user/password mismatched.
pub const MISMATCH_MESSAGE: &str = "invalid username or password";

/// Verifies the `Authorization` header value (without the header name)
/// against `expected`. A disabled credential accepts any request.
pub fn verify_basic_auth(header: Option<&str>, expected: &Credential) -> Result<(), AuthError> {
    if expected.disabled {
        return Ok(());
    }
    let header = header.ok_or(AuthError::MissingHeader)?;
    let encoded = header
        .strip_prefix("Basic ")
        .or_else(|| header.strip_prefix("basic "))
        .ok_or(AuthError::InvalidBasicAuth)?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::InvalidBasicAuth)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidBasicAuth)?;
    let (user, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidBasicAuth)?;

    if credential_matches(user, password, expected) {
        Ok(())
    } else {
        Err(AuthError::Mismatch)
    }
}

/// Builds the `Authorization` header value for the client side of a
/// credentialed route.
pub fn basic_auth_header(credential: &Credential) -> String {
    let raw = format!("{}:{}", credential.user, credential.password);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(raw)
    )
}

/// Compares both user and password as SHA-256 digests, combining the two
/// comparisons with a bitwise AND (not `&&`) so that evaluation never
/// short-circuits on which field mismatched.
fn credential_matches(user: &str, password: &str, expected: &Credential) -> bool {
    let user_ok: bool = Sha256::digest(user.as_bytes())
        .ct_eq(&Sha256::digest(expected.user.as_bytes()))
        .into();
    let password_ok: bool = Sha256::digest(password.as_bytes())
        .ct_eq(&Sha256::digest(expected.password.as_bytes()))
        .into();
    user_ok & password_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_credential() -> Credential {
        Credential {
            user: "u".to_string(),
            password: "p".to_string(),
            disabled: false,
        }
    }

    fn make_valid_header(cred: &Credential) -> String {
        basic_auth_header(cred)
    }

    #[test]
    fn valid_credentials_are_accepted() {
        let cred = make_credential();
        let header = make_valid_header(&cred);
        assert_eq!(verify_basic_auth(Some(&header), &cred), Ok(()));
    }

    #[test]
    fn missing_header_is_rejected() {
        let cred = make_credential();
        assert_eq!(
            verify_basic_auth(None, &cred),
            Err(AuthError::MissingHeader)
        );
    }

    #[test]
    fn wrong_username_is_rejected_with_the_generic_message() {
        let cred = make_credential();
        let header = basic_auth_header(&Credential {
            user: "wrong".to_string(),
            ..cred.clone()
        });
        assert_eq!(verify_basic_auth(Some(&header), &cred), Err(AuthError::Mismatch));
    }

    #[test]
    fn wrong_password_is_rejected_with_the_same_message_as_wrong_username() {
        let cred = make_credential();
        let header = basic_auth_header(&Credential {
            password: "wrong".to_string(),
            ..cred.clone()
        });
        assert_eq!(verify_basic_auth(Some(&header), &cred), Err(AuthError::Mismatch));
    }

    #[test]
    fn disabled_credential_accepts_anything() {
        let cred = Credential {
            disabled: true,
            ..make_credential()
        };
        assert_eq!(verify_basic_auth(None, &cred), Ok(()));
    }

    #[test]
    fn malformed_encoding_is_rejected() {
        let cred = make_credential();
        assert_eq!(
            verify_basic_auth(Some("Basic not-base64!"), &cred),
            Err(AuthError::InvalidBasicAuth)
        );
    }
}

//! Who a request is counted against.
//!
//! An authenticated user id wins; otherwise an anonymous session id carried
//! in a cookie. Session ids are not secrets, only an abuse-deterrence signal.

use std::fmt;

use axum::http::{header, HeaderMap};
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::auth::JwtValidator;

use super::entry::now_millis;

const SESSION_SUFFIX_LEN: usize = 9;
const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Session(String),
}

impl Identity {
    /// Identifier passed to the rate limiter: `user:<id>` or `session:<id>`.
    pub fn identifier(&self) -> String {
        match self {
            Identity::User(id) => format!("user:{}", id),
            Identity::Session(id) => format!("session:{}", id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Outcome of [`resolve_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: Identity,
    /// Session id minted for this request; the caller must set the cookie
    pub issued_session: Option<String>,
}

/// `session_<epoch ms>_<9 alphanumerics>`
pub fn generate_session_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SESSION_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("session_{}_{}", now_millis(), suffix)
}

/// Resolve the caller from a bearer token, then the session cookie.
///
/// An invalid bearer token is not an error here; the request falls back to
/// its session. Without a usable cookie a new session id is issued.
pub fn resolve_identity(
    headers: &HeaderMap,
    jwt: Option<&JwtValidator>,
    session_cookie: &str,
) -> ResolvedIdentity {
    if let (Some(validator), Some(token)) = (jwt, bearer_token(headers)) {
        match validator.validate(token) {
            Ok(claims) => {
                return ResolvedIdentity {
                    identity: Identity::User(claims.user_id().to_string()),
                    issued_session: None,
                };
            }
            Err(e) => {
                tracing::debug!(error = %e, "Bearer token rejected, using session identity");
            }
        }
    }

    if let Some(session) = cookie_value(headers, session_cookie).filter(|s| is_valid_session_id(s)) {
        return ResolvedIdentity {
            identity: Identity::Session(session.to_string()),
            issued_session: None,
        };
    }

    let session = generate_session_id();
    ResolvedIdentity {
        identity: Identity::Session(session.clone()),
        issued_session: Some(session),
    }
}

/// `Set-Cookie` value persisting a session id.
pub fn session_cookie_header(name: &str, session_id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", name, session_id)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use crate::config::JwtConfig;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "identity-test-secret";

    fn validator() -> JwtValidator {
        JwtValidator::new(&JwtConfig {
            secret: SECRET.to_string(),
            issuer: None,
            audience: None,
        })
    }

    fn token(sub: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: sub.to_string(),
            exp: now + 3600,
            iat: now,
            email: None,
            role: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_generated_session_id_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, generate_session_id());
    }

    #[test]
    fn test_valid_bearer_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token("42"))).unwrap(),
        );
        headers.insert(header::COOKIE, HeaderValue::from_static("rl_session=abc"));

        let resolved = resolve_identity(&headers, Some(&validator()), "rl_session");
        assert_eq!(resolved.identity, Identity::User("42".to_string()));
        assert_eq!(resolved.identity.identifier(), "user:42");
        assert!(resolved.issued_session.is_none());
    }

    #[test]
    fn test_invalid_token_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer junk"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; rl_session=session_1_abc"),
        );

        let resolved = resolve_identity(&headers, Some(&validator()), "rl_session");
        assert_eq!(resolved.identity.identifier(), "session:session_1_abc");
        assert!(!resolved.identity.is_authenticated());
        assert!(resolved.issued_session.is_none());
    }

    #[test]
    fn test_missing_or_bad_cookie_issues_session() {
        let resolved = resolve_identity(&HeaderMap::new(), None, "rl_session");
        let issued = resolved.issued_session.clone().unwrap();
        assert_eq!(resolved.identity, Identity::Session(issued.clone()));
        assert!(issued.starts_with("session_"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("rl_session=a b;c"));
        assert!(resolve_identity(&headers, None, "rl_session")
            .issued_session
            .is_some());
    }

    #[test]
    fn test_session_cookie_header() {
        assert_eq!(
            session_cookie_header("rl_session", "session_1_abc"),
            "rl_session=session_1_abc; Path=/; HttpOnly; SameSite=Lax"
        );
    }
}

//! Signed session tokens and the cookie that carries them.

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::User;

/// Claims stored in a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub name: String,
    /// Issued at (Unix timestamp seconds)
    pub iat: u64,
    /// Expiration (Unix timestamp seconds)
    pub exp: u64,
}

/// The signed-in user, as seen by handlers behind the session gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

/// Issues and verifies HS256 session tokens.
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    cookie_name: String,
    cookie_secure: bool,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_hours: i64, cookie_name: &str, cookie_secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl: Duration::hours(ttl_hours.max(1)),
            cookie_name: cookie_name.to_string(),
            cookie_secure,
        }
    }

    /// Build from configuration. Without a configured secret a random one is
    /// generated, so sessions do not survive a restart.
    pub fn from_config(config: &Config) -> Self {
        let secret = match &config.session_secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::warn!(
                    "No session secret configured (STORE_SESSION_SECRET). \
                     Using a random secret; sessions end on restart."
                );
                format!(
                    "{}{}",
                    uuid::Uuid::new_v4().simple(),
                    uuid::Uuid::new_v4().simple()
                )
            }
        };

        Self::new(
            &secret,
            config.session_ttl_hours,
            &config.session_cookie,
            config.cookie_secure,
        )
    }

    /// Issue a token for a user.
    pub fn issue(&self, user: &SessionUser) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            iat: now.timestamp().max(0) as u64,
            exp: (now + self.ttl).timestamp().max(0) as u64,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token's signature and expiry.
    pub fn verify(&self, token: &str) -> Option<SessionUser> {
        match decode::<SessionClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(SessionUser {
                id: data.claims.sub,
                email: data.claims.email,
                name: data.claims.name,
            }),
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                None
            }
        }
    }

    /// Extract the token from the session cookie, else from a bearer header.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        let from_cookie = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.cookie_name)
            .map(|cookie| cookie.value_trimmed().to_string())
            .filter(|value| !value.is_empty());

        from_cookie.or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.trim().to_string())
        })
    }

    /// The verified user behind a request, if any.
    pub fn user_from_headers(&self, headers: &HeaderMap) -> Option<SessionUser> {
        self.token_from_headers(headers)
            .and_then(|token| self.verify(&token))
    }

    /// `Set-Cookie` value carrying a fresh token.
    pub fn session_cookie(&self, token: &str) -> String {
        self.cookie(token, self.ttl.num_seconds())
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn clear_cookie(&self) -> String {
        self.cookie("", 0)
    }

    fn cookie(&self, value: &str, max_age: i64) -> String {
        Cookie::build((self.cookie_name.clone(), value.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(CookieDuration::seconds(max_age))
            .build()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::HeaderValue;

    fn manager(secret: &str) -> SessionManager {
        SessionManager::new(secret, 24, "session-token", false)
    }

    fn user() -> SessionUser {
        SessionUser {
            id: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let sessions = manager("secret-one");
        let token = sessions.issue(&user()).unwrap();
        assert_eq!(sessions.verify(&token), Some(user()));
    }

    #[test]
    fn test_wrong_secret_and_garbage_rejected() {
        let token = manager("secret-one").issue(&user()).unwrap();
        assert_eq!(manager("secret-two").verify(&token), None);
        assert_eq!(manager("secret-one").verify("not.a.token"), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let sessions = manager("secret-one");
        let claims = SessionClaims {
            sub: "u-1".to_string(),
            email: "ada@example.com".to_string(),
            name: "Ada".to_string(),
            iat: 1_000_000,
            exp: 1_000_100,
        };
        let token = encode(&Header::default(), &claims, &sessions.encoding).unwrap();
        assert_eq!(sessions.verify(&token), None);
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let sessions = manager("secret-one");

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session-token=abc.def.ghi; other=1"),
        );
        assert_eq!(
            sessions.token_from_headers(&headers).as_deref(),
            Some("abc.def.ghi")
        );

        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer xyz"),
        );
        assert_eq!(sessions.token_from_headers(&headers).as_deref(), Some("xyz"));

        assert_eq!(sessions.token_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_quoted_cookie_value_is_accepted() {
        let sessions = manager("secret-one");
        let token = sessions.issue(&user()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; session-token=\"{}\"", token)).unwrap(),
        );
        assert_eq!(sessions.user_from_headers(&headers), Some(user()));
    }

    #[test]
    fn test_cookie_strings() {
        let sessions = SessionManager::new("s", 2, "session-token", true);
        let cookie = sessions.session_cookie("tok");
        assert!(cookie.starts_with("session-token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Secure"));

        let cleared = sessions.clear_cookie();
        assert!(cleared.starts_with("session-token=;"));
        assert!(cleared.contains("Max-Age=0"));

        let plain = SessionManager::new("s", 2, "session-token", false).session_cookie("tok");
        assert!(!plain.contains("Secure"));
    }
}

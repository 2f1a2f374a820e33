use std::sync::Arc;

use argon2::Config as Argon2Config;
use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rand::{rngs::OsRng, RngCore};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{Error, Issue, Result},
    model::{
        api::validation::Issues,
        db::Admin,
        mongodb::Id,
        store::{AdminStore, Store},
    },
};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw admin credentials, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl AdminCredentials {
    /// Check the credentials are acceptable for a new admin account.
    pub fn validate(&self) -> Result<()> {
        let mut issues = Issues::new();
        if self.username.trim().is_empty() {
            issues.push(Issue::new("username", "must not be empty"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            issues.push(Issue::new(
                "password",
                format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }
        issues.finish()
    }

    /// Convert to a new [`Admin`] by hashing the password with a fresh
    /// 16-byte salt.
    pub fn into_admin(self) -> Result<Admin> {
        self.validate()?;
        let mut salt = [0_u8; 16];
        OsRng.fill_bytes(&mut salt);
        let password_hash =
            argon2::hash_encoded(self.password.as_bytes(), &salt, &Argon2Config::default())
                .map_err(|e| Error::Internal(format!("password hashing failed: {e}")))?;
        Ok(Admin {
            id: Id::new(),
            username: self.username.trim().to_string(),
            password_hash,
            failed_logins: 0,
            locked_until: None,
        })
    }
}

/// A signed token identifying an authenticated admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminToken {
    pub id: Id,
    #[serde(rename = "sub")]
    pub username: String,
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AdminToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

impl AdminToken {
    pub fn new(admin: &Admin) -> Self {
        Self {
            id: admin.id,
            username: admin.username.clone(),
        }
    }

    /// Sign the token.
    pub fn encode(self, config: &Config) -> Result<String> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        Ok(jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?)
    }

    /// Sign the token and wrap it in a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let token = self.encode(config)?;
        let mut cookie = Cookie::build(AUTH_TOKEN_COOKIE, token)
            .path("/")
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .secure(config.secure_cookies())
            .same_site(SameSite::Strict)
            .finish();
        if let Some(domain) = config.cookie_domain() {
            cookie.set_domain(domain.to_string());
        }
        Ok(cookie)
    }

    pub fn decode(token: &str, config: &Config) -> Result<Self> {
        let token = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims.token)?;
        Ok(token)
    }

    pub fn removal_cookie(config: &Config) -> Cookie<'static> {
        let mut cookie = Cookie::named(AUTH_TOKEN_COOKIE);
        cookie.set_path("/");
        if let Some(domain) = config.cookie_domain() {
            cookie.set_domain(domain.to_string());
        }
        cookie
    }
}

/// Read the raw token from the auth cookie, or from an
/// `Authorization: Bearer` header.
fn raw_token(req: &Request<'_>) -> Option<String> {
    if let Some(cookie) = req.cookies().get(AUTH_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    req.headers()
        .get_one("Authorization")
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = Error;

    /// Get an [`AdminToken`] and check the admin it names still exists.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let unauthorized = || {
            Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("Admin authentication required".to_string()),
            ))
        };

        let (Some(config), Some(store)) = (
            req.rocket().state::<Config>(),
            req.rocket().state::<Arc<dyn Store>>(),
        ) else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Internal("config or store is not managed".to_string()),
            ));
        };

        let Some(raw) = raw_token(req) else {
            return unauthorized();
        };
        let Ok(token) = Self::decode(&raw, config) else {
            return unauthorized();
        };

        match store.admin_by_id(token.id).await {
            Ok(Some(_)) => Outcome::Success(token),
            Ok(None) => unauthorized(),
            Err(e) => Outcome::Failure((Status::InternalServerError, e)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDescription {
    pub id: Id,
    pub username: String,
    pub locked_until: Option<DateTime<Utc>>,
}

impl From<Admin> for AdminDescription {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            username: admin.username,
            locked_until: admin.locked_until,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCredentials {
        pub fn example() -> Self {
            Self {
                username: "returning-officer".into(),
                password: "correct horse battery staple".into(),
            }
        }

        pub fn example2() -> Self {
            Self {
                username: "deputy-officer".into(),
                password: "totallysecurepassword".into(),
            }
        }
    }
}

use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration as CookieDuration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{common::Purpose, mongodb::Id},
};

/// Per-purpose session settings.
pub trait Flow: Send + Sync + 'static {
    const PURPOSE: Purpose;
    /// Name of the cookie that carries the session.
    const COOKIE: &'static str;

    fn session_ttl(config: &Config) -> Duration;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NominationFlow;

impl Flow for NominationFlow {
    const PURPOSE: Purpose = Purpose::Nomination;
    const COOKIE: &'static str = "nomination_session";

    fn session_ttl(config: &Config) -> Duration {
        config.nomination_session_ttl()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalFlow;

impl Flow for WithdrawalFlow {
    const PURPOSE: Purpose = Purpose::Withdrawal;
    const COOKIE: &'static str = "withdrawal_session";

    fn session_ttl(config: &Config) -> Duration {
        config.withdrawal_session_ttl()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingFlow;

impl Flow for VotingFlow {
    const PURPOSE: Purpose = Purpose::Voting;
    const COOKIE: &'static str = "voting_session";

    fn session_ttl(config: &Config) -> Duration {
        config.voting_session_ttl()
    }
}

/// Proof that the holder verified a code for `email` on `event_id`, for the
/// purpose of flow `F`.
///
/// Sessions are signed but not stored: they stay valid until they expire,
/// whatever happens to the code record afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session<F> {
    pub email: String,
    pub event_id: Id,
    pub expire_at: DateTime<Utc>,
    phantom: PhantomData<F>,
}

/// Signed session claims.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    email: String,
    #[serde(rename = "eventId")]
    event_id: Id,
    #[serde(rename = "type")]
    purpose: Purpose,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

impl<F: Flow> Session<F> {
    /// A new session expiring after the flow's TTL.
    pub fn new(email: String, event_id: Id, config: &Config) -> Self {
        Self {
            email,
            event_id,
            expire_at: Utc::now() + F::session_ttl(config),
            phantom: PhantomData,
        }
    }

    /// Sign the session and wrap it in a cookie.
    pub fn into_cookie(self, config: &Config) -> Result<Cookie<'static>> {
        let claims = Claims {
            email: self.email,
            event_id: self.event_id,
            purpose: F::PURPOSE,
            expire_at: self.expire_at,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )?;

        let mut cookie = Cookie::build(F::COOKIE, token)
            .path("/")
            .max_age(CookieDuration::seconds(
                F::session_ttl(config).num_seconds(),
            ))
            .http_only(true)
            .secure(config.secure_cookies())
            .same_site(SameSite::Lax)
            .finish();
        if let Some(domain) = config.cookie_domain() {
            cookie.set_domain(domain.to_string());
        }
        Ok(cookie)
    }

    /// Verify a signed session, rejecting sessions issued for other flows.
    pub fn from_token(token: &str, config: &Config) -> Result<Self> {
        let claims = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|data: TokenData<Claims>| data.claims)?;

        if claims.purpose != F::PURPOSE {
            return Err(Error::Unauthorized(format!(
                "Session is not valid for {}",
                F::PURPOSE
            )));
        }

        Ok(Self {
            email: claims.email,
            event_id: claims.event_id,
            expire_at: claims.expire_at,
            phantom: PhantomData,
        })
    }

    /// A cookie that, when removed from the jar, clears this flow's session.
    pub fn removal_cookie(config: &Config) -> Cookie<'static> {
        let mut cookie = Cookie::named(F::COOKIE);
        cookie.set_path("/");
        if let Some(domain) = config.cookie_domain() {
            cookie.set_domain(domain.to_string());
        }
        cookie
    }
}

#[rocket::async_trait]
impl<'r, F: Flow> FromRequest<'r> for Session<F> {
    type Error = Error;

    /// Get the flow's session from its cookie.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Internal("config is not managed".to_string()),
                ))
            }
        };

        let cookie = match req.cookies().get(F::COOKIE) {
            Some(cookie) => cookie,
            None => {
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized(format!(
                        "No verified {} session, please verify your email first",
                        F::PURPOSE
                    )),
                ))
            }
        };

        match Self::from_token(cookie.value(), config) {
            Ok(session) => Outcome::Success(session),
            Err(err) => Outcome::Failure((Status::Unauthorized, err)),
        }
    }
}

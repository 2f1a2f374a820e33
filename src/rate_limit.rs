//! Per-IP fixed-window rate limiting for the endpoints that send email or
//! check passwords.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::warn;
use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Error;

/// Expired windows are pruned once this many addresses are tracked.
const PRUNE_AT: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Hits {
    window_start: DateTime<Utc>,
    count: u32,
}

/// Counts requests per client IP within fixed windows.
#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    exempt_loopback: bool,
    hits: DashMap<IpAddr, Hits>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration, exempt_loopback: bool) -> Self {
        Self {
            max,
            window,
            exempt_loopback,
            hits: DashMap::new(),
        }
    }

    /// Record a request from `ip` at `now`, returning whether it is allowed.
    ///
    /// Requests with no known client address are always allowed.
    pub fn check(&self, ip: Option<IpAddr>, now: DateTime<Utc>) -> bool {
        let Some(ip) = ip else {
            return true;
        };
        if self.exempt_loopback && ip.is_loopback() {
            return true;
        }

        if self.hits.len() >= PRUNE_AT {
            self.prune(now);
        }

        let mut hits = self.hits.entry(ip).or_insert(Hits {
            window_start: now,
            count: 0,
        });
        if now - hits.window_start >= self.window {
            *hits = Hits {
                window_start: now,
                count: 0,
            };
        }
        if hits.count >= self.max {
            return false;
        }
        hits.count += 1;
        true
    }

    /// Forget addresses whose window has ended.
    fn prune(&self, now: DateTime<Utc>) {
        self.hits.retain(|_, hits| now - hits.window_start < self.window);
    }
}

/// Request guard that fails with 429 once the client IP exceeds its quota.
///
/// Keyed on the peer address. Forwarding headers such as `X-Real-IP` are
/// client-controlled and would let a caller pick a fresh quota.
#[derive(Debug, Clone, Copy)]
pub struct RateLimited;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RateLimited {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(limiter) = req.rocket().state::<RateLimiter>() else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Internal("rate limiter is not managed".to_string()),
            ));
        };

        let ip = req.remote().map(|remote| remote.ip());
        if limiter.check(ip, Utc::now()) {
            Outcome::Success(RateLimited)
        } else {
            if let Some(ip) = ip {
                warn!("Rate limit exceeded for {ip} on {}", req.uri());
            }
            Outcome::Failure((Status::TooManyRequests, Error::RateLimited))
        }
    }
}

use std::sync::Arc;

use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::{
    model::{
        api::auth::AdminCredentials,
        mongodb::ensure_indexes_exist,
        store::{ensure_admin_exists, MemoryStore, MongoStore, Store},
    },
    notifier::{Notifier, Outbox, SmtpConfig, SmtpNotifier},
    rate_limit::RateLimiter,
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    frontend_url: String,
    #[serde(default = "defaults::email_domain")]
    email_domain: String,
    #[serde(default = "defaults::otp_ttl")]
    otp_ttl: u32,
    #[serde(default = "defaults::otp_max_attempts")]
    otp_max_attempts: u32,
    #[serde(default = "defaults::short_session_ttl")]
    nomination_session_ttl: u32,
    #[serde(default = "defaults::short_session_ttl")]
    withdrawal_session_ttl: u32,
    #[serde(default = "defaults::voting_session_ttl")]
    voting_session_ttl: u32,
    #[serde(default = "defaults::auth_ttl")]
    auth_ttl: u32,
    #[serde(default)]
    cookie_domain: Option<String>,
    #[serde(default)]
    secure_cookies: bool,
    #[serde(default = "defaults::rate_limit_max")]
    rate_limit_max: u32,
    #[serde(default = "defaults::rate_limit_window")]
    rate_limit_window: u32,
    #[serde(default)]
    rate_limit_exempt_loopback: bool,
    #[serde(default = "defaults::admin_lockout_threshold")]
    admin_lockout_threshold: u32,
    #[serde(default = "defaults::admin_lockout_duration")]
    admin_lockout_duration: u32,
    // secrets
    jwt_secret: String,
}

mod defaults {
    pub fn email_domain() -> String {
        "unb.ca".to_string()
    }

    pub const fn otp_ttl() -> u32 {
        30 * 60
    }

    pub const fn otp_max_attempts() -> u32 {
        5
    }

    pub const fn short_session_ttl() -> u32 {
        30 * 60
    }

    pub const fn voting_session_ttl() -> u32 {
        60 * 60
    }

    pub const fn auth_ttl() -> u32 {
        8 * 60 * 60
    }

    pub const fn rate_limit_max() -> u32 {
        10
    }

    pub const fn rate_limit_window() -> u32 {
        15 * 60
    }

    pub const fn admin_lockout_threshold() -> u32 {
        5
    }

    pub const fn admin_lockout_duration() -> u32 {
        15 * 60
    }
}

impl Config {
    /// Base URL of the frontend, used to build links in emails.
    pub fn frontend_url(&self) -> &str {
        self.frontend_url.trim_end_matches('/')
    }

    /// Domain every student email address must belong to.
    pub fn email_domain(&self) -> &str {
        &self.email_domain
    }

    /// Valid lifetime of a one-time code.
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl.into())
    }

    /// Wrong guesses allowed before a code locks.
    pub fn otp_max_attempts(&self) -> u32 {
        self.otp_max_attempts
    }

    pub fn nomination_session_ttl(&self) -> Duration {
        Duration::seconds(self.nomination_session_ttl.into())
    }

    pub fn withdrawal_session_ttl(&self) -> Duration {
        Duration::seconds(self.withdrawal_session_ttl.into())
    }

    pub fn voting_session_ttl(&self) -> Duration {
        Duration::seconds(self.voting_session_ttl.into())
    }

    /// Valid lifetime of admin auth token cookies.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Fixed domain for session cookies, if any.
    pub fn cookie_domain(&self) -> Option<&str> {
        self.cookie_domain.as_deref()
    }

    /// Whether cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    pub fn admin_lockout_threshold(&self) -> u32 {
        self.admin_lockout_threshold
    }

    pub fn admin_lockout_duration(&self) -> Duration {
        Duration::seconds(self.admin_lockout_duration.into())
    }

    /// The rate limiter this config describes.
    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(
            self.rate_limit_max,
            Duration::seconds(self.rate_limit_window.into()),
            self.rate_limit_exempt_loopback,
        )
    }
}

/// A fairing that loads the application config and puts it, and the rate
/// limiter it configures, in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        let limiter = config.rate_limiter();
        rocket = rocket.manage(config).manage(limiter);
        Ok(rocket)
    }
}

/// Which storage backend to use.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Storage {
    #[default]
    Mongodb,
    Memory,
}

/// Configuration for storage.
#[derive(Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    storage: Storage,
    #[serde(default = "default_db_name")]
    db_name: String,
    admin_username: Option<String>,
    // secrets
    db_uri: Option<String>,
    admin_password: Option<String>,
}

fn default_db_name() -> String {
    "elections".to_string()
}

impl StoreConfig {
    fn bootstrap_admin(&self) -> Option<AdminCredentials> {
        match (&self.admin_username, &self.admin_password) {
            (Some(username), Some(password)) => Some(AdminCredentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// A fairing that loads the storage config, connects to the database if
/// there is one, performs any setup necessary, and places an
/// `Arc<dyn Store>` into managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load storage config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let store: Arc<dyn Store> = match config.storage {
            Storage::Memory => {
                warn!("Using in-memory storage, all data is lost on shutdown");
                Arc::new(MemoryStore::default())
            }
            Storage::Mongodb => {
                let Some(db_uri) = config.db_uri.as_deref() else {
                    error!("`db_uri` must be set when `storage = \"mongodb\"`");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                // Construct the connection.
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                let db = client.database(&config.db_name);

                // Ensure the required indexes exist.
                if let Err(e) = ensure_indexes_exist(&db).await {
                    error!("Failed to connect to database: {e}");
                    return Err(rocket);
                }
                info!("...database connection online!");
                Arc::new(MongoStore::new(db))
            }
        };

        // Ensure there is at least one admin user.
        if let Err(e) = ensure_admin_exists(&*store, config.bootstrap_admin()).await {
            error!("Failed to create bootstrap admin: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// Which mail backend to use.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mail {
    #[default]
    Smtp,
    Log,
}

#[derive(Deserialize)]
struct NotifierConfig {
    #[serde(default)]
    mail: Mail,
}

/// A fairing that loads the mail config and places an `Arc<dyn Notifier>`
/// into managed state.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Notifier",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<NotifierConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load mail config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let notifier: Arc<dyn Notifier> = match config.mail {
            Mail::Log => {
                warn!("Emails will be logged, not delivered");
                Arc::new(Outbox::default())
            }
            Mail::Smtp => {
                let smtp = match rocket.figment().extract::<SmtpConfig>() {
                    Ok(smtp) => smtp,
                    Err(e) => {
                        error!("Failed to load SMTP config");
                        rocket::config::pretty_print_error(e);
                        return Err(rocket);
                    }
                };
                match SmtpNotifier::new(&smtp) {
                    Ok(notifier) => {
                        info!("Loaded SMTP config for {}", smtp.host);
                        Arc::new(notifier)
                    }
                    Err(e) => {
                        error!("Failed to configure SMTP transport: {e}");
                        return Err(rocket);
                    }
                }
            }
        };

        // Manage the state.
        rocket = rocket.manage(notifier);
        Ok(rocket)
    }
}


#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config: Config = Figment::new()
            .merge(Serialized::default("frontend_url", "https://vote.example.org/"))
            .merge(Serialized::default("jwt_secret", "s3cret"))
            .extract()
            .unwrap();

        assert_eq!(config.frontend_url(), "https://vote.example.org");
        assert_eq!(config.email_domain(), "unb.ca");
        assert_eq!(config.otp_ttl(), Duration::minutes(30));
        assert_eq!(config.otp_max_attempts(), 5);
        assert_eq!(config.voting_session_ttl(), Duration::hours(1));
        assert_eq!(config.admin_lockout_duration(), Duration::minutes(15));
        assert_eq!(config.cookie_domain(), None);
        assert!(!config.secure_cookies());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let result = Figment::new()
            .merge(Serialized::default("frontend_url", "https://vote.example.org"))
            .extract::<Config>();
        assert!(result.is_err());
    }
}

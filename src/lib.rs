#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{figment::Figment, Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod rate_limit;
pub mod workflow;

pub use config::Config;

use crate::{
    config::{ConfigFairing, NotifierFairing, StoreFairing},
    logging::LoggerFairing,
    model::store::Store,
    notifier::Notifier,
};

/// Build the server from `Rocket.toml` and the environment. Storage and
/// mail are set up by fairings when the server ignites.
pub fn build() -> Rocket<Build> {
    mount(rocket::build())
        .attach(ConfigFairing)
        .attach(StoreFairing)
        .attach(NotifierFairing)
}

/// Build the server around an existing store and notifier.
pub fn rocket_for_store_and_notifier(
    figment: Figment,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
) -> Rocket<Build> {
    mount(rocket::custom(figment))
        .attach(ConfigFairing)
        .manage(store)
        .manage(notifier)
}

fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", api::routes())
        .register("/", error::catchers())
        .attach(LoggerFairing)
}

/// Configuration for tests: Rocket's defaults plus the keys without one.
#[cfg(test)]
pub(crate) fn test_figment() -> Figment {
    use rocket::figment::providers::Serialized;

    Figment::from(rocket::Config::debug_default())
        .merge(Serialized::default("log_level", "off"))
        .merge(Serialized::default("frontend_url", "http://localhost:3000"))
        .merge(Serialized::default("jwt_secret", "test-jwt-secret"))
        .merge(Serialized::default("email_domain", "unb.ca"))
        .merge(Serialized::default("rate_limit_exempt_loopback", false))
}

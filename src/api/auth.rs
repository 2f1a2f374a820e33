use chrono::Utc;
use log::{info, warn};
use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::auth::{AdminCredentials, AdminToken},
        store::AdminStore,
    },
    rate_limit::RateLimited,
    workflow::Services,
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    _limited: RateLimited,
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    services: Services<'_>,
) -> Result<()> {
    let Services { store, config, .. } = services;
    let unauthorized = || {
        Error::Unauthorized(
            "No admin found with the provided username and password combination".to_string(),
        )
    };

    let admin = store
        .admin_by_username(credentials.username.trim())
        .await?
        .ok_or_else(unauthorized)?;

    let now = Utc::now();
    if admin.is_locked(now) {
        return Err(Error::Locked(
            "Account is temporarily locked, please try again later".to_string(),
        ));
    }

    if !admin.verify_password(&credentials.password) {
        let locked = store
            .record_login_failure(
                admin.id,
                config.admin_lockout_threshold(),
                now + config.admin_lockout_duration(),
            )
            .await?;
        if locked {
            warn!("Admin {} locked after repeated failed logins", admin.username);
            return Err(Error::Locked(
                "Too many failed login attempts, account is temporarily locked".to_string(),
            ));
        }
        return Err(unauthorized());
    }

    store.reset_login_failures(admin.id).await?;
    cookies.add(AdminToken::new(&admin).into_cookie(config)?);
    info!("Admin {} logged in", admin.username);

    Ok(())
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar<'_>, config: &State<Config>) -> Status {
    cookies.remove(AdminToken::removal_cookie(config));
    Status::Ok
}

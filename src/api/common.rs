use std::{convert::Infallible, sync::Arc};

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::{
    config::Config,
    error::Error,
    model::store::Store,
    notifier::Notifier,
    workflow::{ClientInfo, Services},
};

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Services<'r> {
    type Error = Error;

    /// Borrow the managed store, notifier and config.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let rocket = req.rocket();
        match (
            rocket.state::<Arc<dyn Store>>(),
            rocket.state::<Arc<dyn Notifier>>(),
            rocket.state::<Config>(),
        ) {
            (Some(store), Some(notifier), Some(config)) => Outcome::Success(Services {
                store: &**store,
                notifier: &**notifier,
                config,
            }),
            _ => Outcome::Failure((
                Status::InternalServerError,
                Error::Internal("store, notifier or config is not managed".to_string()),
            )),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientInfo {
    type Error = Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(ClientInfo {
            ip_address: req.client_ip().map(|ip| ip.to_string()),
            user_agent: req.headers().get_one("User-Agent").map(str::to_string),
        })
    }
}

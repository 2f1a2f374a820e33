use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::event::{NominationEventDescription, VotingEventDescription},
        store::EventStore,
    },
    workflow::Services,
};

pub fn routes() -> Vec<Route> {
    routes![nomination_event, voting_event]
}

/// Public details of an active nomination event.
#[get("/nomination/events/<slug>")]
pub async fn nomination_event(
    slug: &str,
    services: Services<'_>,
) -> Result<Json<NominationEventDescription>> {
    let event = services
        .store
        .nomination_event_by_slug(slug)
        .await?
        .filter(|event| event.is_active)
        .ok_or_else(|| Error::not_found("Nomination event"))?;
    Ok(Json(NominationEventDescription::public(event, Utc::now())))
}

/// Public details of an active voting event, with its candidates.
#[get("/voting/events/<slug>")]
pub async fn voting_event(slug: &str, services: Services<'_>) -> Result<Json<VotingEventDescription>> {
    let event = services
        .store
        .voting_event_by_slug(slug)
        .await?
        .filter(|event| event.is_active)
        .ok_or_else(|| Error::not_found("Voting event"))?;
    let candidates = services.store.candidates(event.id).await?;
    Ok(Json(VotingEventDescription::public(
        event,
        candidates,
        Utc::now(),
    )))
}

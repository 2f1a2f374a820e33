use chrono::Utc;
use log::info;
use rocket::{http::Status, serde::json::Json, Route};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{AdminCredentials, AdminDescription, AdminToken},
            event::{
                CandidateDescription, CandidateSpec, NominationEventDescription,
                NominationEventSpec, VotingEventDescription, VotingEventSpec,
            },
            nomination::NominationDescription,
            results::EventResults,
        },
        db::{NominationEvent, VotingEvent},
        mongodb::Id,
        store::{AdminStore, EventStore, Store},
    },
    workflow::Services,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        nomination_events,
        create_nomination_event,
        nomination_event,
        update_nomination_event,
        nominations,
        voting_events,
        create_voting_event,
        voting_event,
        update_voting_event,
        add_candidate,
        results,
    ]
}

async fn existing_nomination_event(store: &dyn Store, id: Id) -> Result<NominationEvent> {
    store
        .nomination_event(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Nomination event with ID '{id}'")))
}

async fn existing_voting_event(store: &dyn Store, id: Id) -> Result<VotingEvent> {
    store
        .voting_event(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voting event with ID '{id}'")))
}

#[get("/admins")]
pub async fn get_admins(
    _token: AdminToken,
    services: Services<'_>,
) -> Result<Json<Vec<AdminDescription>>> {
    let admins = services.store.admins().await?;
    Ok(Json(admins.into_iter().map(Into::into).collect()))
}

#[post("/admins", data = "<new_admin>", format = "json")]
pub async fn create_admin(
    token: AdminToken,
    new_admin: Json<AdminCredentials>,
    services: Services<'_>,
) -> Result<(Status, Json<AdminDescription>)> {
    let admin = new_admin.into_inner().into_admin()?;
    services.store.insert_admin(&admin).await?;
    info!("Admin {} created by {}", admin.username, token.username);
    Ok((Status::Created, Json(admin.into())))
}

#[get("/admin/nomination-events")]
pub async fn nomination_events(
    _token: AdminToken,
    services: Services<'_>,
) -> Result<Json<Vec<NominationEventDescription>>> {
    let now = Utc::now();
    let events = services.store.nomination_events().await?;
    Ok(Json(
        events
            .into_iter()
            .map(|event| NominationEventDescription::admin(event, now))
            .collect(),
    ))
}

#[post("/admin/nomination-events", data = "<spec>", format = "json")]
pub async fn create_nomination_event(
    _token: AdminToken,
    spec: Json<NominationEventSpec>,
    services: Services<'_>,
) -> Result<(Status, Json<NominationEventDescription>)> {
    let now = Utc::now();
    let event = spec.into_inner().into_event(Id::new(), now, now)?;
    services.store.insert_nomination_event(&event).await?;
    info!("Created nomination event '{}'", event.slug);
    Ok((
        Status::Created,
        Json(NominationEventDescription::admin(event, now)),
    ))
}

#[get("/admin/nomination-events/<id>")]
pub async fn nomination_event(
    _token: AdminToken,
    id: Id,
    services: Services<'_>,
) -> Result<Json<NominationEventDescription>> {
    let event = existing_nomination_event(services.store, id).await?;
    Ok(Json(NominationEventDescription::admin(event, Utc::now())))
}

/// Replace every field of an event except its ID and creation time.
#[put("/admin/nomination-events/<id>", data = "<spec>", format = "json")]
pub async fn update_nomination_event(
    _token: AdminToken,
    id: Id,
    spec: Json<NominationEventSpec>,
    services: Services<'_>,
) -> Result<Json<NominationEventDescription>> {
    let existing = existing_nomination_event(services.store, id).await?;
    let now = Utc::now();
    let event = spec.into_inner().into_event(id, existing.created_at, now)?;
    services.store.replace_nomination_event(&event).await?;
    info!("Updated nomination event '{}'", event.slug);
    Ok(Json(NominationEventDescription::admin(event, now)))
}

#[get("/admin/nomination-events/<id>/nominations")]
pub async fn nominations(
    _token: AdminToken,
    id: Id,
    services: Services<'_>,
) -> Result<Json<Vec<NominationDescription>>> {
    let event = existing_nomination_event(services.store, id).await?;
    let nominations = services.store.nominations(event.id).await?;
    Ok(Json(nominations.into_iter().map(Into::into).collect()))
}

#[get("/admin/voting-events")]
pub async fn voting_events(
    _token: AdminToken,
    services: Services<'_>,
) -> Result<Json<Vec<VotingEventDescription>>> {
    let now = Utc::now();
    let mut descriptions = Vec::new();
    for event in services.store.voting_events().await? {
        let candidates = services.store.candidates(event.id).await?;
        descriptions.push(VotingEventDescription::admin(event, candidates, now));
    }
    Ok(Json(descriptions))
}

#[post("/admin/voting-events", data = "<spec>", format = "json")]
pub async fn create_voting_event(
    _token: AdminToken,
    spec: Json<VotingEventSpec>,
    services: Services<'_>,
) -> Result<(Status, Json<VotingEventDescription>)> {
    let now = Utc::now();
    let event = spec.into_inner().into_event(Id::new(), now, now)?;
    services.store.insert_voting_event(&event).await?;
    info!("Created voting event '{}'", event.slug);
    Ok((
        Status::Created,
        Json(VotingEventDescription::admin(event, Vec::new(), now)),
    ))
}

#[get("/admin/voting-events/<id>")]
pub async fn voting_event(
    _token: AdminToken,
    id: Id,
    services: Services<'_>,
) -> Result<Json<VotingEventDescription>> {
    let event = existing_voting_event(services.store, id).await?;
    let candidates = services.store.candidates(id).await?;
    Ok(Json(VotingEventDescription::admin(
        event,
        candidates,
        Utc::now(),
    )))
}

#[put("/admin/voting-events/<id>", data = "<spec>", format = "json")]
pub async fn update_voting_event(
    _token: AdminToken,
    id: Id,
    spec: Json<VotingEventSpec>,
    services: Services<'_>,
) -> Result<Json<VotingEventDescription>> {
    let existing = existing_voting_event(services.store, id).await?;
    let now = Utc::now();
    let event = spec.into_inner().into_event(id, existing.created_at, now)?;
    services.store.replace_voting_event(&event).await?;
    info!("Updated voting event '{}'", event.slug);
    let candidates = services.store.candidates(id).await?;
    Ok(Json(VotingEventDescription::admin(event, candidates, now)))
}

#[post("/admin/voting-events/<id>/candidates", data = "<spec>", format = "json")]
pub async fn add_candidate(
    _token: AdminToken,
    id: Id,
    spec: Json<CandidateSpec>,
    services: Services<'_>,
) -> Result<(Status, Json<CandidateDescription>)> {
    let event = existing_voting_event(services.store, id).await?;
    let candidate = spec.into_inner().into_candidate(event.id)?;
    services.store.insert_candidate(&candidate).await?;
    info!(
        "Added candidate {} to voting event '{}'",
        candidate.full_name(),
        event.slug
    );
    Ok((Status::Created, Json(candidate.into())))
}

/// Tallies are computed from the stored votes on every request.
#[get("/admin/voting-events/<id>/results")]
pub async fn results(
    _token: AdminToken,
    id: Id,
    services: Services<'_>,
) -> Result<Json<EventResults>> {
    let event = existing_voting_event(services.store, id).await?;
    let candidates = services.store.candidates(id).await?;
    let votes = services.store.votes(id).await?;
    Ok(Json(EventResults::tally(&event, &candidates, &votes)))
}

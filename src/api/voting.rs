use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::Result,
    model::api::{
        ballot::{BallotForm, VoteReceipt},
        session::{Session, VotingFlow},
        verification::{CodeRequest, TokenResponse, VerifiedResponse, VoteVerifyRequest},
    },
    rate_limit::RateLimited,
    workflow::{voting, ClientInfo, Services},
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![request_otp, verify_otp, submit, clear_session]
}

#[post("/voting/request-otp", data = "<request>", format = "json")]
pub async fn request_otp(
    _limited: RateLimited,
    request: Json<CodeRequest>,
    services: Services<'_>,
    client: ClientInfo,
) -> Result<Json<TokenResponse>> {
    let token = voting::request_code(&services, &request, &client).await?;
    Ok(Json(TokenResponse { token }))
}

#[post("/voting/verify-otp", data = "<request>", format = "json")]
pub async fn verify_otp(
    request: Json<VoteVerifyRequest>,
    cookies: &CookieJar<'_>,
    services: Services<'_>,
) -> Result<Json<VerifiedResponse>> {
    let session = voting::verify_code(&services, &request).await?;
    let response = VerifiedResponse {
        email: session.email.clone(),
        expires_at: session.expire_at,
    };
    cookies.add(session.into_cookie(services.config)?);
    Ok(Json(response))
}

#[post("/voting/submit", data = "<ballot>", format = "json")]
pub async fn submit(
    session: Result<Session<VotingFlow>>,
    ballot: Json<BallotForm>,
    cookies: &CookieJar<'_>,
    services: Services<'_>,
    client: ClientInfo,
) -> Result<Json<VoteReceipt>> {
    let session = session?;
    let receipt = voting::submit(&services, &session, &ballot, &client).await?;
    cookies.remove(Session::<VotingFlow>::removal_cookie(services.config));
    Ok(Json(receipt))
}

#[delete("/voting/session")]
pub fn clear_session(cookies: &CookieJar<'_>, config: &State<Config>) -> Status {
    cookies.remove(Session::<VotingFlow>::removal_cookie(config));
    Status::Ok
}

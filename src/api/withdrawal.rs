use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::Result,
    model::api::{
        nomination::NominationReceipt,
        session::{Session, WithdrawalFlow},
        verification::{
            ShortCodeResponse, VerifiedResponse, VerifyRequest, WithdrawalCodeRequest,
            WithdrawalForm,
        },
    },
    rate_limit::RateLimited,
    workflow::{withdrawal, ClientInfo, Services},
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![request_otp, verify_otp, submit, clear_session]
}

#[post("/withdrawal/request-otp", data = "<request>", format = "json")]
pub async fn request_otp(
    _limited: RateLimited,
    request: Json<WithdrawalCodeRequest>,
    services: Services<'_>,
    client: ClientInfo,
) -> Result<Json<ShortCodeResponse>> {
    let short_code = withdrawal::request_code(&services, &request, &client).await?;
    Ok(Json(ShortCodeResponse { short_code }))
}

#[post("/withdrawal/verify-otp", data = "<request>", format = "json")]
pub async fn verify_otp(
    request: Json<VerifyRequest>,
    cookies: &CookieJar<'_>,
    services: Services<'_>,
) -> Result<Json<VerifiedResponse>> {
    let session = withdrawal::verify_code(&services, &request).await?;
    let response = VerifiedResponse {
        email: session.email.clone(),
        expires_at: session.expire_at,
    };
    cookies.add(session.into_cookie(services.config)?);
    Ok(Json(response))
}

#[post("/withdrawal/submit", data = "<form>", format = "json")]
pub async fn submit(
    session: Result<Session<WithdrawalFlow>>,
    form: Json<WithdrawalForm>,
    cookies: &CookieJar<'_>,
    services: Services<'_>,
) -> Result<Json<NominationReceipt>> {
    let session = session?;
    let receipt = withdrawal::submit(&services, &session, &form).await?;
    cookies.remove(Session::<WithdrawalFlow>::removal_cookie(services.config));
    Ok(Json(receipt))
}

#[delete("/withdrawal/session")]
pub fn clear_session(cookies: &CookieJar<'_>, config: &State<Config>) -> Status {
    cookies.remove(Session::<WithdrawalFlow>::removal_cookie(config));
    Status::Ok
}

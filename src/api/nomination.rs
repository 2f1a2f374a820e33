use rocket::{
    http::{CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::Result,
    model::api::{
        nomination::{NominationForm, NominationReceipt},
        session::{NominationFlow, Session},
        verification::{CodeRequest, ShortCodeResponse, VerifiedResponse, VerifyRequest},
    },
    rate_limit::RateLimited,
    workflow::{nomination, ClientInfo, Services},
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![request_otp, verify_otp, submit, clear_session]
}

#[post("/nomination/request-otp", data = "<request>", format = "json")]
pub async fn request_otp(
    _limited: RateLimited,
    request: Json<CodeRequest>,
    services: Services<'_>,
    client: ClientInfo,
) -> Result<Json<ShortCodeResponse>> {
    let short_code = nomination::request_code(&services, &request, &client).await?;
    Ok(Json(ShortCodeResponse { short_code }))
}

#[post("/nomination/verify-otp", data = "<request>", format = "json")]
pub async fn verify_otp(
    request: Json<VerifyRequest>,
    cookies: &CookieJar<'_>,
    services: Services<'_>,
) -> Result<Json<VerifiedResponse>> {
    let session = nomination::verify_code(&services, &request).await?;
    let response = VerifiedResponse {
        email: session.email.clone(),
        expires_at: session.expire_at,
    };
    cookies.add(session.into_cookie(services.config)?);
    Ok(Json(response))
}

#[post("/nomination/submit", data = "<form>", format = "json")]
pub async fn submit(
    session: Result<Session<NominationFlow>>,
    form: Json<NominationForm>,
    cookies: &CookieJar<'_>,
    services: Services<'_>,
    client: ClientInfo,
) -> Result<Json<NominationReceipt>> {
    let session = session?;
    let receipt = nomination::submit(&services, &session, &form, &client).await?;
    cookies.remove(Session::<NominationFlow>::removal_cookie(services.config));
    Ok(Json(receipt))
}

#[delete("/nomination/session")]
pub fn clear_session(cookies: &CookieJar<'_>, config: &State<Config>) -> Status {
    cookies.remove(Session::<NominationFlow>::removal_cookie(config));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use super::*;
    use crate::{
        api::common::testing::*,
        model::{
            api::session::Flow,
            db::NominationEvent,
            store::{EventStore, MemoryStore},
        },
        notifier::Outbox,
    };

    async fn insert_event(store: &MemoryStore) -> NominationEvent {
        let event = NominationEvent::example();
        store.insert_nomination_event(&event).await.unwrap();
        event
    }

    #[backend_test]
    async fn nominate_end_to_end(client: Client, store: Arc<MemoryStore>, outbox: Arc<Outbox>) {
        let event = insert_event(&store).await;

        let request = CodeRequest {
            email: "JDoe@unb.ca".to_string(),
            slug: event.slug.clone(),
        };
        let body = expect(post(&client, uri!(request_otp), &request).await, Status::Ok).await;
        let short_code = body["shortCode"].as_str().unwrap().to_string();
        assert_eq!(outbox.len(), 1);
        let code = last_code(&outbox, "jdoe@unb.ca");
        assert_ne!(short_code, code);

        let verify = json!({ "shortCode": short_code, "otp": code, "email": "jdoe@UNB.ca" });
        let body = expect(post(&client, uri!(verify_otp), verify).await, Status::Ok).await;
        assert_eq!(body["email"], "jdoe@unb.ca");
        assert!(client.cookies().get(NominationFlow::COOKIE).is_some());

        let response = post(&client, uri!(submit), NominationForm::example()).await;
        let body = expect(response, Status::Ok).await;
        assert_eq!(body["eventId"], event.id.to_string());
        assert!(client.cookies().get(NominationFlow::COOKIE).is_none());

        let nominations = store.all_nominations();
        assert_eq!(nominations.len(), 1);
        assert_eq!(nominations[0].email, "jdoe@unb.ca");
        assert_eq!(nominations[0].ip_address.as_deref(), Some("192.0.2.10"));
        assert_eq!(outbox.len(), 2);
    }

    #[backend_test]
    async fn submit_requires_a_session(client: Client, store: Arc<MemoryStore>) {
        insert_event(&store).await;
        let response = post(&client, uri!(submit), NominationForm::example()).await;
        let body = expect(response, Status::Unauthorized).await;
        assert!(body["error"].as_str().unwrap().contains("verify your email"));
        assert!(store.all_nominations().is_empty());
    }

    #[backend_test]
    async fn wrong_code_reports_remaining_attempts(
        client: Client,
        store: Arc<MemoryStore>,
        outbox: Arc<Outbox>,
    ) {
        let event = insert_event(&store).await;
        let request = CodeRequest {
            email: "asmith@unb.ca".to_string(),
            slug: event.slug,
        };
        let body = expect(post(&client, uri!(request_otp), &request).await, Status::Ok).await;
        let code = last_code(&outbox, "asmith@unb.ca");
        let wrong = if code == "123456" { "654321" } else { "123456" };

        let verify = json!({ "shortCode": body["shortCode"], "otp": wrong });
        let body = expect(post(&client, uri!(verify_otp), verify).await, Status::Unauthorized).await;
        assert!(body["error"].as_str().unwrap().contains("4 attempt"));
        assert!(client.cookies().get(NominationFlow::COOKIE).is_none());
    }

    #[backend_test]
    async fn invalid_email_has_field_details(client: Client, store: Arc<MemoryStore>) {
        let event = insert_event(&store).await;
        let request = CodeRequest {
            email: "jdoe@gmail.com".to_string(),
            slug: event.slug,
        };
        let body = expect(
            post(&client, uri!(request_otp), &request).await,
            Status::BadRequest,
        )
        .await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"][0]["field"], "email");
    }

    #[backend_test]
    async fn malformed_body_uses_error_envelope(client: Client) {
        let response = client
            .post(uri!(request_otp))
            .remote(remote())
            .header(ContentType::JSON)
            .body("{not json")
            .dispatch()
            .await;
        let body = expect(response, Status::BadRequest).await;
        assert_eq!(body["error"], "Malformed request body");
    }

    #[backend_test]
    async fn request_otp_is_rate_limited(client: Client, store: Arc<MemoryStore>) {
        let event = insert_event(&store).await;
        let request = CodeRequest {
            email: "bwong@unb.ca".to_string(),
            slug: event.slug,
        };
        for _ in 0..10 {
            let response = post(&client, uri!(request_otp), &request).await;
            assert_eq!(Status::Ok, response.status());
        }
        let response = post(&client, uri!(request_otp), &request).await;
        let body = expect(response, Status::TooManyRequests).await;
        assert_eq!(body["error"], "Too many requests, please try again later");
    }

    #[backend_test]
    async fn forwarded_address_does_not_reset_the_limit(client: Client, store: Arc<MemoryStore>) {
        let event = insert_event(&store).await;
        let request = CodeRequest {
            email: "bwong@unb.ca".to_string(),
            slug: event.slug,
        };
        let mut statuses = Vec::new();
        for i in 0..11 {
            let response = client
                .post(uri!(request_otp))
                .remote(remote())
                .header(ContentType::JSON)
                .header(Header::new("X-Real-IP", format!("203.0.113.{i}")))
                .body(json!(request).to_string())
                .dispatch()
                .await;
            statuses.push(response.status());
        }
        assert!(statuses[..10].iter().all(|status| *status == Status::Ok));
        assert_eq!(statuses[10], Status::TooManyRequests);
    }

    #[backend_test]
    async fn clearing_the_session_removes_the_cookie(
        client: Client,
        store: Arc<MemoryStore>,
        outbox: Arc<Outbox>,
    ) {
        let event = insert_event(&store).await;
        let request = CodeRequest {
            email: "jdoe@unb.ca".to_string(),
            slug: event.slug,
        };
        let body = expect(post(&client, uri!(request_otp), &request).await, Status::Ok).await;
        let verify = json!({
            "shortCode": body["shortCode"],
            "otp": last_code(&outbox, "jdoe@unb.ca"),
        });
        expect(post(&client, uri!(verify_otp), verify).await, Status::Ok).await;
        assert!(client.cookies().get(NominationFlow::COOKIE).is_some());

        let response = client.delete(uri!(clear_session)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(NominationFlow::COOKIE).is_none());

        let response = post(&client, uri!(submit), NominationForm::example()).await;
        assert_eq!(Status::Unauthorized, response.status());
    }
}

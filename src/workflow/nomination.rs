use chrono::Utc;
use log::info;

use super::{duplicate, request_code as issue_code, requester_email, verify_code as check_code};
use super::{ClientInfo, Services, Subject};
use crate::{
    error::{Error, Result},
    logging::mask_email,
    model::{
        api::{
            nomination::{NominationForm, NominationReceipt},
            otp::{random_withdrawal_token, ShortCode},
            session::{NominationFlow, Session},
            validation,
            verification::{CodeRequest, VerifyRequest},
        },
        db::{Nomination, NominationEvent},
        mongodb::Id,
        store::EventStore,
    },
    notifier::{send_best_effort, templates},
};

const ALREADY_NOMINATED: &str = "You have already submitted a nomination for this event";

async fn active_event_by_slug(services: &Services<'_>, slug: &str) -> Result<NominationEvent> {
    services
        .store
        .nomination_event_by_slug(slug)
        .await?
        .filter(|event| event.is_active)
        .ok_or_else(|| Error::not_found("Nomination event"))
}

async fn active_event(services: &Services<'_>, id: Id) -> Result<NominationEvent> {
    services
        .store
        .nomination_event(id)
        .await?
        .filter(|event| event.is_active)
        .ok_or_else(|| Error::not_found("Nomination event"))
}

fn require_eligible(event: &NominationEvent, email: &str) -> Result<()> {
    if event.is_eligible(email) {
        Ok(())
    } else {
        Err(Error::Eligibility(
            "You are not eligible to submit a nomination for this event".to_string(),
        ))
    }
}

/// Refuse a second nomination unless the first was withdrawn completely.
async fn require_not_nominated(services: &Services<'_>, event_id: Id, email: &str) -> Result<()> {
    let existing = services.store.nomination_by_email(event_id, email).await?;
    match existing {
        Some(nomination) if !nomination.is_withdrawn => {
            Err(Error::Conflict(ALREADY_NOMINATED.to_string()))
        }
        _ => Ok(()),
    }
}

pub async fn request_code(
    services: &Services<'_>,
    request: &CodeRequest,
    client: &ClientInfo,
) -> Result<ShortCode> {
    let email = requester_email(services.config, &request.email)?;
    let slug = validation::slug(&request.slug).map_err(|message| Error::invalid("slug", message))?;

    let event = active_event_by_slug(services, &slug).await?;
    event.nomination_gate().require_open(Utc::now())?;
    require_eligible(&event, &email)?;
    require_not_nominated(services, event.id, &email).await?;

    let subject = Subject {
        email: &email,
        event_id: event.id,
        event_name: &event.name,
    };
    issue_code::<NominationFlow>(services, &subject, client).await
}

/// The optional email is compared case-insensitively with the address the
/// code was sent to.
pub async fn verify_code(
    services: &Services<'_>,
    request: &VerifyRequest,
) -> Result<Session<NominationFlow>> {
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_lowercase);
    check_code::<NominationFlow>(services, &request.short_code, &request.otp, email.as_deref())
        .await
}

pub async fn submit(
    services: &Services<'_>,
    session: &Session<NominationFlow>,
    form: &NominationForm,
    client: &ClientInfo,
) -> Result<NominationReceipt> {
    let now = Utc::now();
    let event = active_event(services, session.event_id).await?;
    event.nomination_gate().require_open(now)?;
    require_eligible(&event, &session.email)?;
    require_not_nominated(services, event.id, &session.email).await?;

    let details = form.validate()?;
    let student = details.student;
    let nomination = Nomination {
        id: Id::new(),
        event_id: event.id,
        email: session.email.clone(),
        first_name: student.first_name,
        last_name: student.last_name,
        student_id: student.student_id,
        faculty: student.faculty,
        year: student.year,
        positions: details.positions,
        is_withdrawn: false,
        withdrawn_positions: Default::default(),
        withdrawn_at: None,
        withdrawal_token: random_withdrawal_token(),
        ip_address: client.ip_address.clone(),
        location: details.location,
        created_at: now,
    };
    services
        .store
        .insert_nomination(&nomination)
        .await
        .map_err(duplicate(ALREADY_NOMINATED))?;
    info!(
        "Recorded nomination {} for {} on event {}",
        nomination.id,
        mask_email(&nomination.email),
        event.id
    );

    let email =
        templates::nomination_confirmation(&nomination, &event.name, services.config.frontend_url());
    send_best_effort(services.notifier, email).await;

    Ok(NominationReceipt::from(&nomination))
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::*;
    use crate::{
        model::{common::Position, db::event::examples::closed_window},
        workflow::testing::*,
    };

    async fn fixture_with_event() -> (Fixture, NominationEvent) {
        let fixture = Fixture::new();
        let event = NominationEvent::example();
        fixture.store.insert_nomination_event(&event).await.unwrap();
        (fixture, event)
    }

    fn code_request(email: &str, event: &NominationEvent) -> CodeRequest {
        CodeRequest {
            email: email.to_string(),
            slug: event.slug.clone(),
        }
    }

    async fn verified_session(
        fixture: &Fixture,
        event: &NominationEvent,
        email: &str,
    ) -> Session<NominationFlow> {
        let short_code = request_code(
            &fixture.services(),
            &code_request(email, event),
            &ClientInfo::default(),
        )
        .await
        .unwrap();
        let request = VerifyRequest {
            short_code,
            otp: fixture.last_code(email),
            email: Some(email.to_uppercase()),
        };
        verify_code(&fixture.services(), &request).await.unwrap()
    }

    #[rocket::async_test]
    async fn nomination_end_to_end() {
        let (fixture, event) = fixture_with_event().await;
        let session = verified_session(&fixture, &event, "jdoe@unb.ca").await;
        assert_eq!(session.email, "jdoe@unb.ca");

        let client = ClientInfo {
            ip_address: Some("10.0.0.7".to_string()),
            user_agent: None,
        };
        let receipt = submit(&fixture.services(), &session, &NominationForm::example(), &client)
            .await
            .unwrap();
        assert_eq!(receipt.event_id, event.id);
        assert!(!receipt.is_withdrawn);

        let stored = fixture.store.all_nominations();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].email, "jdoe@unb.ca");
        assert_eq!(stored[0].ip_address.as_deref(), Some("10.0.0.7"));
        assert_eq!(stored[0].withdrawal_token.len(), 64);

        let emails = fixture.outbox.emails_to("jdoe@unb.ca");
        assert_eq!(emails.len(), 2);
        let link = format!(
            "http://localhost:3000/withdraw?token={}",
            stored[0].withdrawal_token
        );
        assert!(emails[1].html.contains(&link));
    }

    #[rocket::async_test]
    async fn second_submission_is_a_duplicate() {
        let (fixture, event) = fixture_with_event().await;
        let first = verified_session(&fixture, &event, "jdoe@unb.ca").await;
        let second = verified_session(&fixture, &event, "jdoe@unb.ca").await;

        let form = NominationForm::example();
        let client = ClientInfo::default();
        submit(&fixture.services(), &first, &form, &client)
            .await
            .unwrap();
        let result = submit(&fixture.services(), &second, &form, &client).await;
        match result {
            Err(Error::Conflict(message)) => assert_eq!(message, ALREADY_NOMINATED),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(fixture.store.all_nominations().len(), 1);

        let again = request_code(
            &fixture.services(),
            &code_request("jdoe@unb.ca", &event),
            &client,
        )
        .await;
        assert_status(again, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn request_checks_run_in_order() {
        let (fixture, mut event) = fixture_with_event().await;
        let client = ClientInfo::default();

        let missing = CodeRequest {
            email: "jdoe@unb.ca".to_string(),
            slug: "no-such-event".to_string(),
        };
        assert_status(
            request_code(&fixture.services(), &missing, &client).await,
            Status::NotFound,
        );

        let ineligible = code_request("stranger@unb.ca", &event);
        assert_status(
            request_code(&fixture.services(), &ineligible, &client).await,
            Status::Forbidden,
        );

        let foreign = code_request("jdoe@gmail.com", &event);
        assert_status(
            request_code(&fixture.services(), &foreign, &client).await,
            Status::BadRequest,
        );

        event.nomination_window = closed_window();
        fixture.store.replace_nomination_event(&event).await.unwrap();
        let closed = code_request("stranger@unb.ca", &event);
        match request_code(&fixture.services(), &closed, &client).await {
            Err(Error::Eligibility(message)) => {
                assert_eq!(message, "The nomination period has ended")
            }
            other => panic!("expected closed window, got {other:?}"),
        }

        event.enable_time_check = false;
        event.is_active = false;
        fixture.store.replace_nomination_event(&event).await.unwrap();
        assert_status(
            request_code(&fixture.services(), &closed, &client).await,
            Status::NotFound,
        );

        assert!(fixture.store.otp_records().is_empty());
        assert!(fixture.outbox.is_empty());
    }

    #[rocket::async_test]
    async fn disabled_window_check_allows_any_time() {
        let (fixture, mut event) = fixture_with_event().await;
        event.nomination_window = closed_window();
        event.enable_nomination_time = false;
        fixture.store.replace_nomination_event(&event).await.unwrap();

        let session = verified_session(&fixture, &event, "asmith@unb.ca").await;
        let receipt = submit(
            &fixture.services(),
            &session,
            &NominationForm::example(),
            &ClientInfo::default(),
        )
        .await
        .unwrap();
        assert!(receipt.positions.contains(&Position::President));
    }

    #[rocket::async_test]
    async fn window_is_checked_again_on_submit() {
        let (fixture, mut event) = fixture_with_event().await;
        let session = verified_session(&fixture, &event, "jdoe@unb.ca").await;

        event.nomination_window = closed_window();
        fixture.store.replace_nomination_event(&event).await.unwrap();
        let result = submit(
            &fixture.services(),
            &session,
            &NominationForm::example(),
            &ClientInfo::default(),
        )
        .await;
        assert_status(result, Status::Forbidden);
        assert!(fixture.store.all_nominations().is_empty());
    }

    #[rocket::async_test]
    async fn invalid_form_is_rejected_before_writing() {
        let (fixture, event) = fixture_with_event().await;
        let session = verified_session(&fixture, &event, "jdoe@unb.ca").await;
        let form = NominationForm {
            student_id: "3000000".to_string(),
            ..NominationForm::example()
        };

        let result = submit(&fixture.services(), &session, &form, &ClientInfo::default()).await;
        assert_status(result, Status::BadRequest);
        assert!(fixture.store.all_nominations().is_empty());
    }

    #[rocket::async_test]
    async fn confirmation_failure_keeps_the_nomination() {
        let (fixture, event) = fixture_with_event().await;
        let session = verified_session(&fixture, &event, "jdoe@unb.ca").await;
        let services = Services {
            notifier: &FailingNotifier,
            ..fixture.services()
        };

        submit(
            &services,
            &session,
            &NominationForm::example(),
            &ClientInfo::default(),
        )
        .await
        .unwrap();
        assert_eq!(fixture.store.all_nominations().len(), 1);
    }
}

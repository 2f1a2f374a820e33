use chrono::Utc;
use log::info;

use super::{duplicate, request_code as issue_code, requester_email, verify_code as check_code};
use super::{ClientInfo, Services, Subject};
use crate::{
    error::{Error, Result},
    logging::mask_email,
    model::{
        api::{
            ballot::{BallotForm, VoteReceipt},
            otp::ShortCode,
            session::{Session, VotingFlow},
            validation,
            verification::{CodeRequest, VoteVerifyRequest},
        },
        db::{Vote, VotingEvent},
        mongodb::Id,
        store::EventStore,
    },
    notifier::{send_best_effort, templates},
};

const ALREADY_VOTED: &str = "You have already voted in this event";

fn active(event: Option<VotingEvent>) -> Result<VotingEvent> {
    event
        .filter(|event| event.is_active)
        .ok_or_else(|| Error::not_found("Voting event"))
}

fn require_eligible(event: &VotingEvent, email: &str) -> Result<()> {
    if event.is_eligible(email) {
        Ok(())
    } else {
        Err(Error::Eligibility(
            "You are not eligible to vote in this event".to_string(),
        ))
    }
}

async fn require_not_voted(services: &Services<'_>, event_id: Id, email: &str) -> Result<()> {
    match services.store.vote_by_email(event_id, email).await? {
        Some(_) => Err(Error::Conflict(ALREADY_VOTED.to_string())),
        None => Ok(()),
    }
}

pub async fn request_code(
    services: &Services<'_>,
    request: &CodeRequest,
    client: &ClientInfo,
) -> Result<ShortCode> {
    let email = requester_email(services.config, &request.email)?;
    let slug = validation::slug(&request.slug).map_err(|message| Error::invalid("slug", message))?;

    let event = active(services.store.voting_event_by_slug(&slug).await?)?;
    event.voting_gate().require_open(Utc::now())?;
    require_eligible(&event, &email)?;
    require_not_voted(services, event.id, &email).await?;

    let subject = Subject {
        email: &email,
        event_id: event.id,
        event_name: &event.name,
    };
    issue_code::<VotingFlow>(services, &subject, client).await
}

pub async fn verify_code(
    services: &Services<'_>,
    request: &VoteVerifyRequest,
) -> Result<Session<VotingFlow>> {
    check_code::<VotingFlow>(services, &request.token, &request.otp, None).await
}

pub async fn submit(
    services: &Services<'_>,
    session: &Session<VotingFlow>,
    form: &BallotForm,
    client: &ClientInfo,
) -> Result<VoteReceipt> {
    let now = Utc::now();
    let event = active(services.store.voting_event(session.event_id).await?)?;
    event.voting_gate().require_open(now)?;
    require_eligible(&event, &session.email)?;
    require_not_voted(services, event.id, &session.email).await?;

    let details = form.validate()?;
    let candidates = services.store.candidates(event.id).await?;
    let resolved = details.resolve(&candidates)?;

    let voter = details.voter;
    let vote = Vote {
        id: Id::new(),
        event_id: event.id,
        voter_email: session.email.clone(),
        voter_first_name: voter.first_name,
        voter_last_name: voter.last_name,
        voter_student_id: voter.student_id,
        voter_faculty: voter.faculty,
        voter_year: voter.year,
        ballot: resolved
            .iter()
            .map(|(&position, candidate)| (position, candidate.id))
            .collect(),
        ip_address: client.ip_address.clone(),
        location: details.location,
        user_agent: client.user_agent.clone(),
        created_at: now,
    };
    services
        .store
        .insert_vote(&vote)
        .await
        .map_err(duplicate(ALREADY_VOTED))?;
    info!(
        "Recorded vote {} for {} on event {}",
        vote.id,
        mask_email(&vote.voter_email),
        event.id
    );

    let receipt = VoteReceipt::new(&vote, &resolved);
    let choices: Vec<_> = receipt
        .choices
        .iter()
        .map(|choice| (choice.position, choice.candidate_name.clone()))
        .collect();
    let email = templates::vote_receipt(&vote.voter_email, &event.name, &choices);
    send_best_effort(services.notifier, email).await;

    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::*;
    use crate::{
        model::{
            common::Position,
            db::{event::examples::closed_window, Candidate},
        },
        workflow::testing::*,
    };

    struct Setup {
        fixture: Fixture,
        event: VotingEvent,
        alice: Candidate,
        bob: Candidate,
    }

    async fn setup() -> Setup {
        let fixture = Fixture::new();
        let event = VotingEvent::example();
        fixture.store.insert_voting_event(&event).await.unwrap();
        let alice = Candidate::example(event.id, "Alice", &[Position::President]);
        let bob = Candidate::example(event.id, "Bob", &[Position::VicePresidentFinance]);
        fixture.store.insert_candidate(&alice).await.unwrap();
        fixture.store.insert_candidate(&bob).await.unwrap();
        Setup {
            fixture,
            event,
            alice,
            bob,
        }
    }

    fn code_request(email: &str, event: &VotingEvent) -> CodeRequest {
        CodeRequest {
            email: email.to_string(),
            slug: event.slug.clone(),
        }
    }

    async fn verified_session(setup: &Setup, email: &str) -> Session<VotingFlow> {
        let fixture = &setup.fixture;
        let token = request_code(
            &fixture.services(),
            &code_request(email, &setup.event),
            &ClientInfo::default(),
        )
        .await
        .unwrap();
        let request = VoteVerifyRequest {
            token,
            otp: fixture.last_code(email),
        };
        verify_code(&fixture.services(), &request).await.unwrap()
    }

    #[rocket::async_test]
    async fn vote_is_recorded_with_a_receipt() {
        let setup = setup().await;
        let session = verified_session(&setup, "jdoe@unb.ca").await;
        let client = ClientInfo {
            ip_address: Some("10.0.0.9".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };
        let form = BallotForm::example(&[
            (Position::President, setup.alice.id),
            (Position::VicePresidentFinance, setup.bob.id),
        ]);

        let receipt = submit(&setup.fixture.services(), &session, &form, &client)
            .await
            .unwrap();
        assert_eq!(receipt.choices.len(), 2);
        assert_eq!(receipt.choices[0].candidate_name, setup.alice.full_name());

        let votes = setup.fixture.store.all_votes();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].ballot[&Position::President], setup.alice.id);
        assert_eq!(votes[0].user_agent.as_deref(), Some("Mozilla/5.0"));

        let emails = setup.fixture.outbox.emails_to("jdoe@unb.ca");
        assert_eq!(emails.len(), 2);
        assert!(emails[1].html.contains(&setup.bob.full_name()));
    }

    #[rocket::async_test]
    async fn ineligible_request_leaves_no_trace() {
        let setup = setup().await;
        let result = request_code(
            &setup.fixture.services(),
            &code_request("stranger@unb.ca", &setup.event),
            &ClientInfo::default(),
        )
        .await;
        assert_status(result, Status::Forbidden);
        assert!(setup.fixture.store.otp_records().is_empty());
        assert!(setup.fixture.outbox.is_empty());
    }

    #[rocket::async_test]
    async fn candidate_from_another_event_is_rejected() {
        let setup = setup().await;
        let other_event = Id::new();
        let stranger = Candidate::example(other_event, "Eve", &[Position::President]);
        setup.fixture.store.insert_candidate(&stranger).await.unwrap();
        let session = verified_session(&setup, "jdoe@unb.ca").await;

        let form = BallotForm::example(&[(Position::President, stranger.id)]);
        let result = submit(
            &setup.fixture.services(),
            &session,
            &form,
            &ClientInfo::default(),
        )
        .await;
        match result {
            Err(Error::Validation { message, .. }) => {
                assert_eq!(message, "Invalid candidate selection")
            }
            other => panic!("expected invalid selection, got {other:?}"),
        }
        assert!(setup.fixture.store.all_votes().is_empty());
    }

    #[rocket::async_test]
    async fn voting_twice_is_a_duplicate() {
        let setup = setup().await;
        let first = verified_session(&setup, "asmith@unb.ca").await;
        let second = verified_session(&setup, "asmith@unb.ca").await;
        let form = BallotForm::example(&[(Position::President, setup.alice.id)]);
        let client = ClientInfo::default();

        submit(&setup.fixture.services(), &first, &form, &client)
            .await
            .unwrap();
        let result = submit(&setup.fixture.services(), &second, &form, &client).await;
        match result {
            Err(Error::Conflict(message)) => assert_eq!(message, ALREADY_VOTED),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(setup.fixture.store.all_votes().len(), 1);

        let again = request_code(
            &setup.fixture.services(),
            &code_request("asmith@unb.ca", &setup.event),
            &client,
        )
        .await;
        assert_status(again, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn closed_window_blocks_submission() {
        let mut setup = setup().await;
        let session = verified_session(&setup, "bwong@unb.ca").await;
        setup.event.voting_window = closed_window();
        setup
            .fixture
            .store
            .replace_voting_event(&setup.event)
            .await
            .unwrap();

        let form = BallotForm::example(&[(Position::President, setup.alice.id)]);
        let result = submit(
            &setup.fixture.services(),
            &session,
            &form,
            &ClientInfo::default(),
        )
        .await;
        assert_status(result, Status::Forbidden);
    }

    #[rocket::async_test]
    async fn voting_code_is_not_a_nomination_code() {
        let setup = setup().await;
        let token = request_code(
            &setup.fixture.services(),
            &code_request("jdoe@unb.ca", &setup.event),
            &ClientInfo::default(),
        )
        .await
        .unwrap();
        let otp = setup.fixture.last_code("jdoe@unb.ca");

        let request = crate::model::api::verification::VerifyRequest {
            short_code: token,
            otp,
            email: None,
        };
        let result =
            crate::workflow::nomination::verify_code(&setup.fixture.services(), &request).await;
        assert_status(result, Status::Unauthorized);
    }
}

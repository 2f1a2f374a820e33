//! Withdrawing a nomination, in whole or in part.
//!
//! The nominee proves ownership twice: by holding the withdrawal token mailed
//! to them on nomination, and by answering a code sent to the nominated
//! address. A nomination can only be withdrawn from once.

use chrono::Utc;
use log::info;

use super::{request_code as issue_code, verify_code as check_code};
use super::{ClientInfo, Services, Subject};
use crate::{
    error::{Error, Result},
    logging::mask_email,
    model::{
        api::{
            nomination::NominationReceipt,
            otp::ShortCode,
            session::{Session, WithdrawalFlow},
            validation,
            verification::{VerifyRequest, WithdrawalCodeRequest, WithdrawalForm},
        },
        db::{Nomination, NominationEvent, Withdrawal},
        mongodb::Id,
        store::EventStore,
    },
    notifier::{send_best_effort, templates},
};

const ALREADY_WITHDRAWN: &str = "This nomination has already been withdrawn from";

async fn active_event(services: &Services<'_>, id: Id) -> Result<NominationEvent> {
    services
        .store
        .nomination_event(id)
        .await?
        .filter(|event| event.is_active)
        .ok_or_else(|| Error::not_found("Nomination event"))
}

/// A nomination that may still be withdrawn from.
fn withdrawable(nomination: Option<Nomination>) -> Result<Nomination> {
    let nomination = nomination
        .filter(|nomination| !nomination.is_withdrawn)
        .ok_or_else(|| Error::not_found("Nomination"))?;
    if nomination.has_withdrawn() {
        return Err(Error::Conflict(ALREADY_WITHDRAWN.to_string()));
    }
    Ok(nomination)
}

pub async fn request_code(
    services: &Services<'_>,
    request: &WithdrawalCodeRequest,
    client: &ClientInfo,
) -> Result<ShortCode> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(Error::invalid("token", "is required"));
    }

    let nomination = withdrawable(services.store.nomination_by_withdrawal_token(token).await?)?;
    let event = active_event(services, nomination.event_id).await?;
    event.withdrawal_gate().require_open(Utc::now())?;

    let subject = Subject {
        email: &nomination.email,
        event_id: event.id,
        event_name: &event.name,
    };
    issue_code::<WithdrawalFlow>(services, &subject, client).await
}

pub async fn verify_code(
    services: &Services<'_>,
    request: &VerifyRequest,
) -> Result<Session<WithdrawalFlow>> {
    check_code::<WithdrawalFlow>(services, &request.short_code, &request.otp, None).await
}

/// Keep the positions listed in `form`, giving up the rest. Keeping none
/// withdraws the nomination completely.
pub async fn submit(
    services: &Services<'_>,
    session: &Session<WithdrawalFlow>,
    form: &WithdrawalForm,
) -> Result<NominationReceipt> {
    let now = Utc::now();
    let event = active_event(services, session.event_id).await?;
    event.withdrawal_gate().require_open(now)?;

    let mut nomination = withdrawable(
        services
            .store
            .nomination_by_email(event.id, &session.email)
            .await?,
    )?;

    let kept = validation::positions(&form.positions, false)
        .map_err(|message| Error::invalid("positions", message))?;
    if !kept.is_subset(&nomination.positions) {
        return Err(Error::invalid(
            "positions",
            "may only keep positions you were nominated for",
        ));
    }
    let withdrawal = Withdrawal::new(&nomination.positions, kept, now);
    if withdrawal.withdrawn.is_empty() {
        return Err(Error::invalid(
            "positions",
            "must withdraw from at least one position",
        ));
    }

    if !services
        .store
        .apply_withdrawal(nomination.id, &withdrawal)
        .await?
    {
        return Err(Error::Conflict(ALREADY_WITHDRAWN.to_string()));
    }
    withdrawal.apply(&mut nomination);
    info!(
        "{} withdrawal of nomination {} for {}",
        if withdrawal.is_complete() { "Complete" } else { "Partial" },
        nomination.id,
        mask_email(&nomination.email)
    );

    let email = templates::withdrawal_confirmation(&nomination, &event.name, &withdrawal);
    send_best_effort(services.notifier, email).await;

    Ok(NominationReceipt::from(&nomination))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rocket::http::Status;

    use super::*;
    use crate::{
        model::{common::Position, db::event::examples::closed_window},
        workflow::testing::*,
    };

    struct Setup {
        fixture: Fixture,
        event: NominationEvent,
        nomination: Nomination,
    }

    async fn setup() -> Setup {
        let fixture = Fixture::new();
        let event = NominationEvent::example();
        fixture.store.insert_nomination_event(&event).await.unwrap();
        let nomination = Nomination::example(event.id);
        fixture.store.insert_nomination(&nomination).await.unwrap();
        Setup {
            fixture,
            event,
            nomination,
        }
    }

    async fn verified_session(setup: &Setup) -> Session<WithdrawalFlow> {
        let fixture = &setup.fixture;
        let request = WithdrawalCodeRequest {
            token: setup.nomination.withdrawal_token.clone(),
        };
        let short_code = request_code(&fixture.services(), &request, &ClientInfo::default())
            .await
            .unwrap();
        let request = VerifyRequest {
            short_code,
            otp: fixture.last_code(&setup.nomination.email),
            email: None,
        };
        verify_code(&fixture.services(), &request).await.unwrap()
    }

    fn keep(positions: &[Position]) -> WithdrawalForm {
        WithdrawalForm {
            positions: positions.iter().map(ToString::to_string).collect(),
        }
    }

    fn stored(setup: &Setup) -> Nomination {
        setup.fixture.store.all_nominations().remove(0)
    }

    #[rocket::async_test]
    async fn keeping_nothing_withdraws_completely() {
        let setup = setup().await;
        let session = verified_session(&setup).await;

        let receipt = submit(&setup.fixture.services(), &session, &keep(&[]))
            .await
            .unwrap();
        assert!(receipt.is_withdrawn);

        let nomination = stored(&setup);
        assert!(nomination.is_withdrawn);
        assert_eq!(nomination.withdrawn_positions, setup.nomination.positions);
        assert_eq!(nomination.positions, setup.nomination.positions);
        assert!(nomination.withdrawn_at.is_some());

        let emails = setup.fixture.outbox.emails_to("jdoe@unb.ca");
        assert!(emails[1].html.contains("withdrawn completely"));

        let request = WithdrawalCodeRequest {
            token: setup.nomination.withdrawal_token.clone(),
        };
        let again =
            request_code(&setup.fixture.services(), &request, &ClientInfo::default()).await;
        assert_status(again, Status::NotFound);
    }

    #[rocket::async_test]
    async fn keeping_a_subset_withdraws_the_rest() {
        let setup = setup().await;
        let session = verified_session(&setup).await;

        submit(
            &setup.fixture.services(),
            &session,
            &keep(&[Position::President]),
        )
        .await
        .unwrap();

        let nomination = stored(&setup);
        assert!(!nomination.is_withdrawn);
        assert_eq!(nomination.positions, BTreeSet::from([Position::President]));
        assert_eq!(
            nomination.withdrawn_positions,
            BTreeSet::from([Position::VicePresidentFinance])
        );
    }

    #[rocket::async_test]
    async fn partial_withdrawal_is_one_shot() {
        let setup = setup().await;
        let first = verified_session(&setup).await;
        let second = verified_session(&setup).await;
        let services = setup.fixture.services();

        submit(&services, &first, &keep(&[Position::President]))
            .await
            .unwrap();
        let result = submit(&services, &second, &keep(&[])).await;
        match result {
            Err(Error::Conflict(message)) => assert_eq!(message, ALREADY_WITHDRAWN),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(!stored(&setup).is_withdrawn);

        let request = WithdrawalCodeRequest {
            token: setup.nomination.withdrawal_token.clone(),
        };
        let again = request_code(&services, &request, &ClientInfo::default()).await;
        assert_status(again, Status::BadRequest);
    }

    #[rocket::async_test]
    async fn kept_positions_must_be_a_proper_subset() {
        let setup = setup().await;
        let session = verified_session(&setup).await;
        let services = setup.fixture.services();

        let everything = keep(&[Position::President, Position::VicePresidentFinance]);
        assert_status(
            submit(&services, &session, &everything).await,
            Status::BadRequest,
        );
        let foreign = keep(&[Position::VicePresidentAcademic]);
        assert_status(
            submit(&services, &session, &foreign).await,
            Status::BadRequest,
        );
        assert!(!stored(&setup).has_withdrawn());
    }

    #[rocket::async_test]
    async fn unknown_token_is_not_found() {
        let setup = setup().await;
        let request = WithdrawalCodeRequest {
            token: "0".repeat(64),
        };
        let result =
            request_code(&setup.fixture.services(), &request, &ClientInfo::default()).await;
        assert_status(result, Status::NotFound);
        assert!(setup.fixture.outbox.is_empty());
    }

    #[rocket::async_test]
    async fn closed_withdrawal_window_is_forbidden() {
        let mut setup = setup().await;
        setup.event.withdrawal_window = closed_window();
        setup
            .fixture
            .store
            .replace_nomination_event(&setup.event)
            .await
            .unwrap();

        let request = WithdrawalCodeRequest {
            token: setup.nomination.withdrawal_token.clone(),
        };
        let result =
            request_code(&setup.fixture.services(), &request, &ClientInfo::default()).await;
        assert_status(result, Status::Forbidden);
    }
}

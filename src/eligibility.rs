//! Who may act on a request, and when
use crate::config::Config;
use crate::error::{AuthorizationError, RequestError, StateError};
use crate::request::Request;
use crate::types::{Actor, TimeStamp};
use chrono::Utc;

/// Check that `checker` may approve or reject `request` at `now`.
///
/// Nothing is mutated here; a failure leaves the request exactly as it was.
pub fn assert_can_check(
    config: &Config,
    request: &Request,
    checker: &Actor,
    now: &TimeStamp<Utc>,
) -> Result<(), RequestError> {
    if !config.can_check(&checker.kind) {
        return Err(AuthorizationError::CheckerNotWhitelisted(checker.kind.clone()).into());
    }

    if !request.status.is_actionable() {
        return Err(StateError::NotActionable(request.status).into());
    }

    if let Some(window) = config.request_expiration_in_minutes.filter(|minutes| *minutes > 0) {
        let age = request.created_at.minutes_until(now);
        if age > i64::try_from(window).unwrap_or(i64::MAX) {
            return Err(StateError::Expired.into());
        }
    }

    if checker.is(&request.maker) {
        let contact = checker
            .contact
            .as_deref()
            .filter(|contact| !contact.is_empty())
            .ok_or(AuthorizationError::MissingContact)?;

        if !config.is_dual_role(contact) {
            return Err(AuthorizationError::CheckerIsMaker.into());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RequestStatus, RequestType};

    fn request_made_by(maker: &Actor) -> Request {
        Request::new(
            "mcr_elig".into(),
            RequestType::Delete,
            maker.reference(),
            TimeStamp::new_with(2024, 6, 1, 9, 0, 0),
        )
    }

    fn now() -> TimeStamp<Utc> {
        TimeStamp::new_with(2024, 6, 1, 9, 30, 0)
    }

    #[test]
    fn distinct_checker_is_allowed() {
        let maker = Actor::new("user", "1");
        let request = request_made_by(&maker);

        assert!(assert_can_check(&Config::default(), &request, &Actor::new("user", "2"), &now()).is_ok());
    }

    #[test]
    fn maker_cannot_check_own_request() {
        let maker = Actor::new("user", "1").with_contact("maker@example.com");
        let request = request_made_by(&maker);

        let err = assert_can_check(&Config::default(), &request, &maker, &now()).unwrap_err();
        assert!(matches!(
            err,
            RequestError::Authorization(AuthorizationError::CheckerIsMaker)
        ));
    }

    #[test]
    fn allowlisted_contact_may_check_own_request() {
        let maker = Actor::new("user", "1").with_contact("lead@example.com");
        let request = request_made_by(&maker);
        let config = Config {
            whitelisted_contacts: vec!["lead@example.com".into()],
            ..Config::default()
        };

        assert!(assert_can_check(&config, &request, &maker, &now()).is_ok());
    }

    #[test]
    fn allowlist_needs_a_contact() {
        let maker = Actor::new("user", "1");
        let request = request_made_by(&maker);
        let config = Config {
            whitelisted_contacts: vec!["lead@example.com".into()],
            ..Config::default()
        };

        let err = assert_can_check(&config, &request, &maker.clone().with_contact(""), &now())
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::Authorization(AuthorizationError::MissingContact)
        ));
    }

    #[test]
    fn finalized_requests_cannot_be_checked() {
        let mut request = request_made_by(&Actor::new("user", "1"));
        request.status = RequestStatus::Rejected;

        let err = assert_can_check(&Config::default(), &request, &Actor::new("user", "2"), &now())
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::State(StateError::NotActionable(RequestStatus::Rejected))
        ));
    }

    #[test]
    fn expiration_window_is_inclusive() {
        let request = request_made_by(&Actor::new("user", "1"));
        let config = Config {
            request_expiration_in_minutes: Some(60),
            ..Config::default()
        };
        let checker = Actor::new("user", "2");

        let at_limit = TimeStamp::new_with(2024, 6, 1, 10, 0, 0);
        assert!(assert_can_check(&config, &request, &checker, &at_limit).is_ok());

        let past_limit = TimeStamp::new_with(2024, 6, 1, 10, 1, 0);
        let err = assert_can_check(&config, &request, &checker, &past_limit).unwrap_err();
        assert!(matches!(err, RequestError::State(StateError::Expired)));
    }

    #[test]
    fn checker_kind_must_be_whitelisted() {
        let request = request_made_by(&Actor::new("user", "1"));
        let config = Config {
            whitelisted_checkers: vec!["admin".into()],
            ..Config::default()
        };

        let err = assert_can_check(&config, &request, &Actor::new("user", "2"), &now()).unwrap_err();
        assert!(matches!(
            err,
            RequestError::Authorization(AuthorizationError::CheckerNotWhitelisted(kind)) if kind == "user"
        ));
        assert!(assert_can_check(&config, &request, &Actor::new("admin", "2"), &now()).is_ok());
    }
}

//! Explicit login states and the transitions between them.

use std::fmt;

/// Where a session stands in the challenge → solve → submit → verify flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    ChallengeFetched,
    CaptchaSolving,
    Submitted,
    Authenticated,
}

/// Something that happened to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// Login page parsed into a challenge.
    ChallengeParsed,
    /// Entry page landed on home; the portal already trusts us.
    AlreadyLoggedIn,
    /// Captcha text is being resolved for the current challenge.
    CaptchaRequested,
    /// Credentials were POSTed.
    FormSubmitted,
    /// Post-submit checks confirmed a session.
    Verified,
    /// Post-submit checks found no session.
    Rejected,
    /// An operation aborted before submission.
    Failed,
    LoggedOut,
}

/// An event that has no edge from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: AuthState,
    pub event: AuthEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no transition from {:?} on {:?}", self.from, self.event)
    }
}

impl std::error::Error for InvalidTransition {}

impl AuthState {
    /// Transition table.
    pub fn next(self, event: AuthEvent) -> Result<AuthState, InvalidTransition> {
        use AuthEvent::*;
        use AuthState::*;

        let to = match (self, event) {
            (_, LoggedOut) => Anonymous,
            (_, AlreadyLoggedIn) => Authenticated,

            // A fresh login page restarts the flow; when authenticated it
            // means the session expired.
            (_, ChallengeParsed) => ChallengeFetched,
            (ChallengeFetched, CaptchaRequested) => CaptchaSolving,
            (CaptchaSolving, FormSubmitted) => Submitted,
            (Submitted, Verified) => Authenticated,
            (Submitted, Rejected) => Anonymous,

            (Anonymous | ChallengeFetched | CaptchaSolving | Submitted, Failed) => Anonymous,

            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(to)
    }

    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }
}

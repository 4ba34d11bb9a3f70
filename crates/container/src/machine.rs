//! Container state machine.
//!
//! The transition table is keyed by (state, request kind) and either names
//! the lifecycle operation to run or rejects the request. No rejected
//! request causes a transition.

use warden_core::{CreateRequest, Error, RequestPayload, Result, State, StopRequest};

/// Lifecycle operation selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition<'a> {
    /// Born -> Active
    Create(&'a CreateRequest),
    /// Active -> Stopped
    Stop(&'a StopRequest),
    /// Active | Stopped -> Destroyed
    Destroy,
}

impl Transition<'_> {
    /// State reached when the operation succeeds.
    pub fn target(&self) -> State {
        match self {
            Transition::Create(_) => State::Active,
            Transition::Stop(_) => State::Stopped,
            Transition::Destroy => State::Destroyed,
        }
    }
}

/// Select the operation for `payload` in `state`.
pub fn transition(state: State, payload: &RequestPayload) -> Result<Transition<'_>> {
    match (state, payload) {
        (State::Born, RequestPayload::Create(req)) => Ok(Transition::Create(req)),
        (State::Active, RequestPayload::Stop(req)) => Ok(Transition::Stop(req)),
        (State::Active | State::Stopped, RequestPayload::Destroy(_)) => Ok(Transition::Destroy),
        (state, _) => Err(Error::InvalidState(state)),
    }
}

/// Whether the lifecycle has an edge from `from` to `to`.
pub fn can_advance(from: State, to: State) -> bool {
    matches!(
        (from, to),
        (State::Born, State::Active)
            | (State::Active, State::Stopped)
            | (State::Active, State::Destroyed)
            | (State::Stopped, State::Destroyed)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::DestroyRequest;

    const STATES: [State; 4] = [State::Born, State::Active, State::Stopped, State::Destroyed];

    fn payloads() -> Vec<RequestPayload> {
        vec![
            CreateRequest::default().into(),
            StopRequest::default().into(),
            DestroyRequest {}.into(),
        ]
    }

    #[test]
    fn test_born_only_accepts_create() {
        let create = RequestPayload::Create(CreateRequest::default());
        assert!(matches!(transition(State::Born, &create), Ok(Transition::Create(_))));

        let stop = RequestPayload::Stop(StopRequest::default());
        let err = transition(State::Born, &stop).unwrap_err();
        assert_eq!(err.to_string(), "Cannot execute request in state: born");
    }

    #[test]
    fn test_destroyed_rejects_everything() {
        for payload in payloads() {
            assert!(matches!(
                transition(State::Destroyed, &payload),
                Err(Error::InvalidState(State::Destroyed))
            ));
        }
    }

    #[test]
    fn test_accepted_transitions_only_move_forward() {
        let mut accepted = 0;
        for state in STATES {
            for payload in payloads() {
                if let Ok(t) = transition(state, &payload) {
                    accepted += 1;
                    assert!(can_advance(state, t.target()), "{} -> {}", state, t.target());
                    assert!(state < t.target());
                }
            }
        }
        // create in Born, stop and destroy in Active, destroy in Stopped
        assert_eq!(accepted, 4);
    }

    #[test]
    fn test_no_edge_regresses() {
        for from in STATES {
            for to in STATES {
                if can_advance(from, to) {
                    assert!(from < to);
                }
            }
        }
        assert!(!can_advance(State::Born, State::Stopped));
        assert!(!can_advance(State::Born, State::Destroyed));
    }
}

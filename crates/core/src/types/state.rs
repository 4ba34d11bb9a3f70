use serde::{Deserialize, Serialize};

/// Lifecycle state of a container.
///
/// ```text
/// Born ──create──▶ Active ──stop──▶ Stopped
///                    │                 │
///                    └──destroy──▶ Destroyed ◀──destroy
/// ```
///
/// States only ever advance; `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Born,
    Active,
    Stopped,
    Destroyed,
}

impl State {
    /// Whether the container has reached its terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Destroyed)
    }

    /// Whether the container is listed in the process-wide registry while in this state.
    pub fn is_registered(&self) -> bool {
        matches!(self, State::Active | State::Stopped)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Born => write!(f, "born"),
            State::Active => write!(f, "active"),
            State::Stopped => write!(f, "stopped"),
            State::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering_follows_lifecycle() {
        assert!(State::Born < State::Active);
        assert!(State::Active < State::Stopped);
        assert!(State::Stopped < State::Destroyed);
    }

    #[test]
    fn test_state_serde_is_lowercase() {
        let json = serde_json::to_string(&State::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");

        let state: State = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(state, State::Active);

        assert!(serde_json::from_str::<State>("\"zombie\"").is_err());
    }
}

use super::model::PendingFlags;

/// Per-conversation send-pipeline state.
///
/// `Sending` covers the synchronous setup between accepting a send and
/// dispatching the reply request; `AwaitingReply` and `AwaitingSuggestions`
/// cover the two gateway awaits. Every path returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryState {
    #[default]
    Idle,
    Sending,
    AwaitingReply,
    AwaitingSuggestions,
}

/// State transition input for the send pipeline lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTransition {
    BeginSend,
    ReplyRequested,
    ReplyArrived,
    ReplyFailed,
    SuggestionsResolved,
}

/// Rejection reason for illegal delivery transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryRejection {
    /// A reply cycle is already in flight; new sends must wait.
    Busy { state: DeliveryState },
    NotSending,
    NotAwaitingReply,
    NotAwaitingSuggestions,
}

pub type DeliveryResult = Result<DeliveryState, DeliveryRejection>;

impl DeliveryState {
    /// True while a send would be rejected. The suggestion phase is
    /// best-effort and does not block new sends.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Sending | Self::AwaitingReply)
    }

    pub fn pending_flags(&self) -> PendingFlags {
        PendingFlags {
            is_replying: matches!(self, Self::AwaitingReply),
            is_generating_suggestions: matches!(self, Self::AwaitingSuggestions),
        }
    }

    /// Applies one transition deterministically.
    ///
    /// `BeginSend` from `AwaitingSuggestions` supersedes the running
    /// suggestion phase; the superseded pipeline's own `SuggestionsResolved`
    /// is then rejected and its result discarded by the caller.
    pub fn apply(&self, transition: DeliveryTransition) -> DeliveryResult {
        match transition {
            DeliveryTransition::BeginSend => self.apply_begin_send(),
            DeliveryTransition::ReplyRequested => self.apply_reply_requested(),
            DeliveryTransition::ReplyArrived => self.apply_reply_arrived(),
            DeliveryTransition::ReplyFailed => self.apply_reply_failed(),
            DeliveryTransition::SuggestionsResolved => self.apply_suggestions_resolved(),
        }
    }

    fn apply_begin_send(&self) -> DeliveryResult {
        match self {
            Self::Idle | Self::AwaitingSuggestions => Ok(Self::Sending),
            Self::Sending | Self::AwaitingReply => {
                Err(DeliveryRejection::Busy { state: *self })
            }
        }
    }

    fn apply_reply_requested(&self) -> DeliveryResult {
        match self {
            Self::Sending => Ok(Self::AwaitingReply),
            Self::Idle | Self::AwaitingReply | Self::AwaitingSuggestions => {
                Err(DeliveryRejection::NotSending)
            }
        }
    }

    fn apply_reply_arrived(&self) -> DeliveryResult {
        match self {
            Self::AwaitingReply => Ok(Self::AwaitingSuggestions),
            Self::Idle | Self::Sending | Self::AwaitingSuggestions => {
                Err(DeliveryRejection::NotAwaitingReply)
            }
        }
    }

    fn apply_reply_failed(&self) -> DeliveryResult {
        match self {
            Self::AwaitingReply => Ok(Self::Idle),
            Self::Idle | Self::Sending | Self::AwaitingSuggestions => {
                Err(DeliveryRejection::NotAwaitingReply)
            }
        }
    }

    fn apply_suggestions_resolved(&self) -> DeliveryResult {
        match self {
            Self::AwaitingSuggestions => Ok(Self::Idle),
            Self::Idle | Self::Sending | Self::AwaitingReply => {
                Err(DeliveryRejection::NotAwaitingSuggestions)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_states_back_to_idle() {
        let state = DeliveryState::Idle;
        let state = state.apply(DeliveryTransition::BeginSend).unwrap();
        assert_eq!(state, DeliveryState::Sending);
        let state = state.apply(DeliveryTransition::ReplyRequested).unwrap();
        assert_eq!(state, DeliveryState::AwaitingReply);
        assert!(state.pending_flags().is_replying);
        let state = state.apply(DeliveryTransition::ReplyArrived).unwrap();
        assert_eq!(state, DeliveryState::AwaitingSuggestions);
        assert!(state.pending_flags().is_generating_suggestions);
        let state = state.apply(DeliveryTransition::SuggestionsResolved).unwrap();
        assert_eq!(state, DeliveryState::Idle);
        assert_eq!(state.pending_flags(), PendingFlags::default());
    }

    #[test]
    fn send_is_rejected_while_a_reply_is_in_flight() {
        for busy in [DeliveryState::Sending, DeliveryState::AwaitingReply] {
            assert!(busy.is_busy());
            assert!(matches!(
                busy.apply(DeliveryTransition::BeginSend),
                Err(DeliveryRejection::Busy { .. })
            ));
        }
    }

    #[test]
    fn send_supersedes_a_running_suggestion_phase() {
        let state = DeliveryState::AwaitingSuggestions;
        assert!(!state.is_busy());
        assert_eq!(
            state.apply(DeliveryTransition::BeginSend).unwrap(),
            DeliveryState::Sending
        );
    }

    #[test]
    fn reply_failure_returns_to_idle() {
        let state = DeliveryState::AwaitingReply;
        assert_eq!(
            state.apply(DeliveryTransition::ReplyFailed).unwrap(),
            DeliveryState::Idle
        );
    }

    #[test]
    fn out_of_phase_transitions_are_rejected() {
        assert_eq!(
            DeliveryState::Idle.apply(DeliveryTransition::ReplyArrived),
            Err(DeliveryRejection::NotAwaitingReply)
        );
        assert_eq!(
            DeliveryState::Sending.apply(DeliveryTransition::SuggestionsResolved),
            Err(DeliveryRejection::NotAwaitingSuggestions)
        );
        assert_eq!(
            DeliveryState::AwaitingSuggestions.apply(DeliveryTransition::ReplyRequested),
            Err(DeliveryRejection::NotSending)
        );
    }
}

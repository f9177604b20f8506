use serde::{Deserialize, Serialize};

use crate::errors::EditorError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistKind {
    GenerateItems,
    ImproveNotes,
}

impl AssistKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenerateItems => "generate_items",
            Self::ImproveNotes => "improve_notes",
        }
    }
}

impl std::fmt::Display for AssistKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle for one dispatched assist request. Only the ticket of the pending
/// request can complete it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssistTicket {
    sequence: u64,
    kind: AssistKind,
}

impl AssistTicket {
    pub fn kind(&self) -> AssistKind {
        self.kind
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AssistState {
    #[default]
    Idle,
    Pending(AssistTicket),
    Succeeded { kind: AssistKind },
    Failed { kind: AssistKind, reason: String },
}

impl AssistState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssistOutcome {
    Succeeded,
    Failed { reason: String },
}

/// Idle → Pending → Succeeded | Failed → Idle.
///
/// A resolved state may start a new request directly; `acknowledge` only
/// clears the last outcome.
#[derive(Clone, Debug, Default)]
pub struct AssistTracker {
    state: AssistState,
    dispatched: u64,
}

impl AssistTracker {
    pub fn state(&self) -> &AssistState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_pending()
    }

    pub fn begin(&mut self, kind: AssistKind) -> Result<AssistTicket, EditorError> {
        if let AssistState::Pending(pending) = &self.state {
            return Err(EditorError::Busy { pending: pending.kind });
        }

        self.dispatched += 1;
        let ticket = AssistTicket { sequence: self.dispatched, kind };
        self.state = AssistState::Pending(ticket);
        Ok(ticket)
    }

    pub fn finish(&mut self, ticket: AssistTicket, outcome: AssistOutcome) -> Result<(), EditorError> {
        match &self.state {
            AssistState::Pending(pending) if *pending == ticket => {}
            _ => return Err(EditorError::StaleTicket),
        }

        self.state = match outcome {
            AssistOutcome::Succeeded => AssistState::Succeeded { kind: ticket.kind },
            AssistOutcome::Failed { reason } => AssistState::Failed { kind: ticket.kind, reason },
        };
        Ok(())
    }

    pub fn acknowledge(&mut self) {
        if !self.state.is_pending() {
            self.state = AssistState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::EditorError;

    use super::{AssistKind, AssistOutcome, AssistState, AssistTracker};

    #[test]
    fn idle_to_pending_to_succeeded_to_idle() {
        let mut tracker = AssistTracker::default();
        assert_eq!(tracker.state(), &AssistState::Idle);

        let ticket = tracker.begin(AssistKind::GenerateItems).expect("idle -> pending");
        assert!(tracker.is_busy());
        assert_eq!(ticket.kind(), AssistKind::GenerateItems);

        tracker.finish(ticket, AssistOutcome::Succeeded).expect("pending -> succeeded");
        assert_eq!(tracker.state(), &AssistState::Succeeded { kind: AssistKind::GenerateItems });

        tracker.acknowledge();
        assert_eq!(tracker.state(), &AssistState::Idle);
    }

    #[test]
    fn second_dispatch_is_rejected_while_pending() {
        let mut tracker = AssistTracker::default();
        let _ticket = tracker.begin(AssistKind::ImproveNotes).expect("first dispatch");

        let error = tracker.begin(AssistKind::GenerateItems).expect_err("second dispatch");
        assert!(matches!(error, EditorError::Busy { pending: AssistKind::ImproveNotes }));
    }

    #[test]
    fn failure_records_reason_and_allows_new_dispatch() {
        let mut tracker = AssistTracker::default();
        let ticket = tracker.begin(AssistKind::GenerateItems).expect("dispatch");
        tracker
            .finish(ticket, AssistOutcome::Failed { reason: "timeout".to_string() })
            .expect("pending -> failed");

        assert_eq!(
            tracker.state(),
            &AssistState::Failed { kind: AssistKind::GenerateItems, reason: "timeout".to_string() }
        );
        assert!(tracker.begin(AssistKind::GenerateItems).is_ok());
    }

    #[test]
    fn completed_ticket_cannot_complete_again() {
        let mut tracker = AssistTracker::default();
        let first = tracker.begin(AssistKind::GenerateItems).expect("first");
        tracker.finish(first, AssistOutcome::Succeeded).expect("finish first");
        let second = tracker.begin(AssistKind::GenerateItems).expect("second");

        let error = tracker.finish(first, AssistOutcome::Succeeded).expect_err("stale");
        assert!(matches!(error, EditorError::StaleTicket));
        assert_eq!(tracker.state(), &AssistState::Pending(second));
    }

    #[test]
    fn acknowledge_does_not_clear_pending_request() {
        let mut tracker = AssistTracker::default();
        let ticket = tracker.begin(AssistKind::ImproveNotes).expect("dispatch");

        tracker.acknowledge();
        assert_eq!(tracker.state(), &AssistState::Pending(ticket));
    }
}

//! The per-path trace recorder.

use crate::events::{EventKind, TraceEvent};
use serde::{Deserialize, Serialize};

/// The ordered event sequence of one explored path.
///
/// Append-only; the trace is the only state the core keeps for a path and
/// lives in memory for the duration of that path.  It is used for
/// verification and counterexample reporting, never for control flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    events: Vec<TraceEvent>,
}

impl Trace {
    /// An empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning it the next sequence number.
    ///
    /// Returns the event's position in the trace.
    pub fn push(&mut self, component: impl Into<String>, kind: EventKind) -> usize {
        let position = self.events.len();
        self.events.push(TraceEvent {
            seq: position as u64,
            component: component.into(),
            kind,
        });
        position
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Position the next pushed event will receive.
    pub fn position(&self) -> usize {
        self.events.len()
    }

    /// All recorded events, in order.
    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Iterate over events of one component.
    pub fn for_component<'a>(
        &'a self,
        component: &'a str,
    ) -> impl Iterator<Item = &'a TraceEvent> {
        self.events.iter().filter(move |e| e.component == component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AttemptOutcome;

    #[test]
    fn push_assigns_dense_sequence_numbers() {
        let mut trace = Trace::new();
        assert!(trace.is_empty());

        let p0 = trace.push(
            "a",
            EventKind::RegistrationAttempted {
                outcome: AttemptOutcome::Success,
            },
        );
        let p1 = trace.push("a", EventKind::Deregistered);

        assert_eq!((p0, p1), (0, 1));
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.position(), 2);
        assert_eq!(trace.events()[1].seq, 1);
    }

    #[test]
    fn for_component_filters() {
        let mut trace = Trace::new();
        trace.push("a", EventKind::Deregistered);
        trace.push("b", EventKind::Deregistered);
        trace.push("a", EventKind::Deregistered);

        assert_eq!(trace.for_component("a").count(), 2);
        assert_eq!(trace.for_component("b").count(), 1);
        assert_eq!(trace.for_component("c").count(), 0);
    }
}

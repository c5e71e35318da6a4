use logdiff_core::raw::{self, EventKind, Side};
use logdiff_core::{ClusterLabel, Event, EventMap, Result, RunState};
use serde_json::Value;
use tracing::debug;

use crate::collaborator::LabeledText;

/// Offset added to labels imported from a previous run so they cannot
/// collide with labels produced by this run's fresh clustering.
pub const PREV_RUN_LABEL_OFFSET: ClusterLabel = 10_000;

/// Raw control and test events for one run, keyed by provisional label.
///
/// Both sides keep insertion order; a label appears once per side and
/// re-adding to it appends another event (another host, or a previous run).
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    control: EventMap,
    test: EventMap,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a canonical event. Never fails.
    pub fn add_event(&mut self, event: Event, kind: EventKind) {
        let key = if kind.is_prev() {
            PREV_RUN_LABEL_OFFSET + event.cluster_label
        } else {
            event.cluster_label
        };
        self.side_mut(kind.side()).entry(key).or_default().push(event);
    }

    /// Normalize a raw record of the given kind and append it.
    pub fn add_raw(&mut self, value: Value, kind: EventKind) -> Result<()> {
        let event = raw::normalize(value, kind)?;
        self.add_event(event, kind);
        Ok(())
    }

    /// Import the raw events of a previous run's output. Returns the number
    /// of events added.
    pub fn merge_prev_state(&mut self, prev: &RunState) -> usize {
        let mut added = 0;
        for events in prev.control_events.values() {
            for event in events {
                self.add_event(event.clone(), EventKind::ControlPrev);
                added += 1;
            }
        }
        for events in prev.test_events.values() {
            for event in events {
                self.add_event(event.clone(), EventKind::TestPrev);
                added += 1;
            }
        }
        debug!(added, "merged previous run state");
        added
    }

    pub fn control_events(&self) -> &EventMap {
        &self.control
    }

    pub fn test_events(&self) -> &EventMap {
        &self.test
    }

    pub(crate) fn control_events_mut(&mut self) -> &mut EventMap {
        &mut self.control
    }

    pub(crate) fn test_events_mut(&mut self) -> &mut EventMap {
        &mut self.test
    }

    pub fn has_data(&self) -> bool {
        !self.control.is_empty() || !self.test.is_empty()
    }

    /// One representative text per control label (the first event's text).
    pub fn control_texts(&self) -> Vec<LabeledText> {
        representative_texts(&self.control)
    }

    /// One representative text per test label (the first event's text).
    pub fn test_texts(&self) -> Vec<LabeledText> {
        representative_texts(&self.test)
    }

    /// Control texts followed by test texts.
    pub fn all_texts(&self) -> Vec<LabeledText> {
        let mut texts = self.control_texts();
        texts.extend(self.test_texts());
        texts
    }

    pub fn into_parts(self) -> (EventMap, EventMap) {
        (self.control, self.test)
    }

    fn side_mut(&mut self, side: Side) -> &mut EventMap {
        match side {
            Side::Control => &mut self.control,
            Side::Test => &mut self.test,
        }
    }
}

fn representative_texts(events: &EventMap) -> Vec<LabeledText> {
    events
        .iter()
        .filter_map(|(label, events)| {
            events
                .first()
                .map(|event| LabeledText::new(*label, event.text.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(label: ClusterLabel, text: &str, host: &str, count: i64) -> Event {
        Event::new(label, text).with_frequency(count, None, host)
    }

    #[test]
    fn readding_a_label_appends() {
        let mut store = EventStore::new();
        store.add_event(event(1, "a", "h1", 3), EventKind::Control);
        store.add_event(event(1, "a", "h2", 4), EventKind::Control);
        store.add_event(event(2, "b", "h1", 1), EventKind::Control);

        assert_eq!(store.control_events().len(), 2);
        assert_eq!(store.control_events()[&1].len(), 2);
        assert!(store.test_events().is_empty());
    }

    #[test]
    fn prev_events_are_offset() {
        let mut store = EventStore::new();
        store.add_event(event(3, "a", "h1", 3), EventKind::TestPrev);
        store.add_event(event(3, "a", "h1", 3), EventKind::Test);

        assert!(store.test_events().contains_key(&3));
        let prev = &store.test_events()[&(PREV_RUN_LABEL_OFFSET + 3)];
        // The event itself keeps its own label.
        assert_eq!(prev[0].cluster_label, 3);
    }

    #[test]
    fn texts_follow_insertion_order() {
        let mut store = EventStore::new();
        store.add_event(event(9, "nine", "h", 1), EventKind::Control);
        store.add_event(event(2, "two", "h", 1), EventKind::Control);
        store.add_event(event(9, "nine again", "h2", 1), EventKind::Control);
        store.add_event(event(5, "five", "h", 1), EventKind::Test);

        let control = store.control_texts();
        assert_eq!(
            control,
            vec![LabeledText::new(9, "nine"), LabeledText::new(2, "two")]
        );

        let all = store.all_texts();
        assert_eq!(all.len(), 3);
        assert_eq!(all[2], LabeledText::new(5, "five"));
    }

    #[test]
    fn raw_records_default_host() {
        let mut store = EventStore::new();
        store
            .add_raw(
                json!({"cluster_label": 1, "_raw": "boom", "cluster_count": 2}),
                EventKind::Test,
            )
            .unwrap();
        assert_eq!(store.test_events()[&1][0].host(), "Unknown");
    }

    #[test]
    fn merge_prev_state_counts_events() {
        let mut prev = RunState::default();
        prev.control_events.insert(1, vec![event(1, "a", "h", 1), event(1, "a", "h2", 2)]);
        prev.test_events.insert(4, vec![event(4, "d", "h", 1)]);

        let mut store = EventStore::new();
        assert!(!store.has_data());
        assert_eq!(store.merge_prev_state(&prev), 3);
        assert!(store.has_data());
        assert_eq!(store.control_events()[&(PREV_RUN_LABEL_OFFSET + 1)].len(), 2);
        assert_eq!(store.test_events()[&(PREV_RUN_LABEL_OFFSET + 4)].len(), 1);
    }
}

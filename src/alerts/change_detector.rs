use std::collections::HashSet;

use crate::notifications::NotificationRecord;

#[derive(Debug, Default)]
enum DetectorState {
    #[default]
    Priming,
    Armed {
        baseline: HashSet<String>,
    },
}

/// Diffs consecutive snapshots to find genuinely new notifications.
///
/// The first snapshot only sets the baseline. After that, every id absent
/// from the previous snapshot counts as new; unread ones are reported.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    state: DetectorState,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, DetectorState::Armed { .. })
    }

    /// Go back to priming, e.g. after the subscription was rebound.
    pub fn reset(&mut self) {
        self.state = DetectorState::Priming;
    }

    /// Feed the next snapshot. Returns the new unread records, in list order.
    pub fn observe<'a>(&mut self, snapshot: &'a [NotificationRecord]) -> Vec<&'a NotificationRecord> {
        let current: HashSet<String> = snapshot.iter().map(|record| record.id.clone()).collect();

        let fresh = match &self.state {
            DetectorState::Priming => Vec::new(),
            DetectorState::Armed { baseline } => snapshot
                .iter()
                .filter(|record| !record.read && !baseline.contains(&record.id))
                .collect(),
        };

        self.state = DetectorState::Armed { baseline: current };
        fresh
    }
}

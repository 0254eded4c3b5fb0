//! # Series Cascade
//!
//! In a series string every panel carries the same current, so the first
//! degraded panel limits everything wired after it. Followers take the
//! originator's current and displayed state; their own health is untouched.

use super::PanelReading;

/// Index of the first panel whose displayed state is fault or cleaning
pub fn originating_index(panels: &[PanelReading]) -> Option<usize> {
    panels.iter().position(|p| p.state.is_degraded())
}

/// Apply the series current-limiting rule to a string, in wiring order.
///
/// Returns the originating index. Deterministic: output depends only on the
/// input readings.
pub fn propagate(panels: &mut [PanelReading]) -> Option<usize> {
    let origin = originating_index(panels)?;
    let (head, followers) = panels.split_at_mut(origin + 1);
    let originator = &head[origin];

    for follower in followers {
        follower.state = originator.state;
        follower.reading.limit_current(originator.reading.current_a);
        follower.affected_by_series = true;
    }
    Some(origin)
}

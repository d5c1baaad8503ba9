//! Event filter matching.

use std::collections::BTreeSet;

use crate::event::EventView;
use crate::webhook::EventFilter;

/// Returns `true` if `event` is relevant to a webhook with the given `filter`.
///
/// Target types, target values, kind types and kind names are evaluated
/// independently and combined with AND; an empty set accepts everything in
/// its category. Target criteria match when the primary target or any extra
/// target qualifies.
///
/// The outcome flags narrow the result further: `error_only` rejects
/// successful events and `success_only` rejects failed ones.
pub fn matches(event: &EventView, filter: &EventFilter) -> bool {
    let targets_match = accepts_any(
        &filter.target_types,
        event.targets().map(|t| t.target_type.as_str()),
    ) && accepts_any(
        &filter.target_values,
        event.targets().map(|t| t.value.as_str()),
    );

    let kind_matches = accepts_any(&filter.kind_types, [event.kind.kind_type.as_str()])
        && accepts_any(&filter.kind_names, [event.kind.name.as_str()]);

    let outcome_matches = if event.is_success() {
        !filter.error_only
    } else {
        !filter.success_only
    };

    targets_match && kind_matches && outcome_matches
}

impl EventFilter {
    /// Returns `true` if `event` passes this filter. See [`matches`].
    #[inline]
    pub fn matches(&self, event: &EventView) -> bool {
        matches(event, self)
    }
}

fn accepts_any<'a>(set: &BTreeSet<String>, values: impl IntoIterator<Item = &'a str>) -> bool {
    set.is_empty() || values.into_iter().any(|value| set.contains(value))
}

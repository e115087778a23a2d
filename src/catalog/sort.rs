use std::cmp::Ordering;

use crate::model::{Ms, OpportunityView};

/// Listing order. Every strategy is a stable sort, so ties keep source order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortStrategy {
    /// Earliest eligible occurrence first.
    StartTime,
    /// Organization name, byte-lexicographic.
    OrganizationName,
    /// Fewest total openings first.
    TotalOpenings,
    /// Shortest first occurrence first.
    FirstDuration,
}

impl SortStrategy {
    pub const DEFAULT: SortStrategy = SortStrategy::StartTime;

    /// Map a request sort code. Unknown codes yield `None`, which callers
    /// treat as "keep source order".
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(SortStrategy::StartTime),
            2 => Some(SortStrategy::OrganizationName),
            3 => Some(SortStrategy::TotalOpenings),
            4 => Some(SortStrategy::FirstDuration),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            SortStrategy::StartTime => 1,
            SortStrategy::OrganizationName => 2,
            SortStrategy::TotalOpenings => 3,
            SortStrategy::FirstDuration => 4,
        }
    }

    pub fn compare(self, a: &OpportunityView, b: &OpportunityView) -> Ordering {
        match self {
            SortStrategy::StartTime => first_start(a).cmp(&first_start(b)),
            SortStrategy::OrganizationName => a.organization_name.cmp(&b.organization_name),
            SortStrategy::TotalOpenings => total_openings(a).cmp(&total_openings(b)),
            SortStrategy::FirstDuration => first_duration(a).cmp(&first_duration(b)),
        }
    }

    fn needs_occurrences(self) -> bool {
        matches!(self, SortStrategy::StartTime | SortStrategy::FirstDuration)
    }

    /// # Panics
    /// For start-time and duration sorts, if any view has no occurrence
    /// views, whatever the input length.
    pub fn sort(self, views: &mut [OpportunityView]) {
        if self.needs_occurrences() {
            if let Some(empty) = views.iter().find(|v| v.occurrence_views.is_empty()) {
                panic!(
                    "{self:?} sort requires at least one occurrence view (opportunity {})",
                    empty.id
                );
            }
        }
        views.sort_by(|a, b| self.compare(a, b));
    }
}

// Panics on an empty occurrence list: projection never emits one, so
// reaching it here is a bug upstream.
fn first_start(view: &OpportunityView) -> Ms {
    view.occurrence_views
        .first()
        .expect("start-time sort requires at least one occurrence view")
        .start_time
}

fn first_duration(view: &OpportunityView) -> Ms {
    view.occurrence_views
        .first()
        .expect("duration sort requires at least one occurrence view")
        .duration_ms()
}

fn total_openings(view: &OpportunityView) -> u64 {
    view.occurrence_views.iter().map(|o| u64::from(o.openings)).sum()
}

/// Order views by a request sort code. Unknown codes return the input
/// unchanged.
pub fn sort_views(mut views: Vec<OpportunityView>, code: i32) -> Vec<OpportunityView> {
    if let Some(strategy) = SortStrategy::from_code(code) {
        strategy.sort(&mut views);
    }
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{at, opportunity, H};
    use crate::catalog::projection::{project, CandidateDates};
    use ulid::Ulid;

    fn view(opp: crate::model::Opportunity) -> OpportunityView {
        project(&opp, &CandidateDates::any()).unwrap()
    }

    fn names(views: &[OpportunityView]) -> Vec<&str> {
        views.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn codes_round_trip() {
        for code in 1..=4 {
            assert_eq!(SortStrategy::from_code(code).unwrap().code(), code);
        }
        assert_eq!(SortStrategy::from_code(0), None);
        assert_eq!(SortStrategy::from_code(99), None);
        assert_eq!(SortStrategy::DEFAULT.code(), 1);
    }

    #[test]
    fn start_time_sort() {
        let a = view(opportunity("A").occurrence(at(2024, 5, 1, 10, 0), at(2024, 5, 1, 12, 0), 1).build());
        let b = view(opportunity("B").occurrence(at(2024, 4, 20, 9, 0), at(2024, 4, 20, 11, 0), 1).build());
        let sorted = sort_views(vec![a, b], 1);
        assert_eq!(names(&sorted), vec!["B", "A"]);
    }

    #[test]
    fn organization_name_sort() {
        let a = view(opportunity("A").organization(Ulid::new(), "Zoo Friends").occurrence(0, H, 1).build());
        let b = view(opportunity("B").organization(Ulid::new(), "Animal Rescue").occurrence(0, H, 1).build());
        let c = view(opportunity("C").organization(Ulid::new(), "Meals").occurrence(0, H, 1).build());
        let sorted = sort_views(vec![a, b, c], 2);
        assert_eq!(names(&sorted), vec!["B", "C", "A"]);
    }

    #[test]
    fn total_openings_sort() {
        let a = view(opportunity("A").occurrence(0, H, 2).occurrence(2 * H, 3 * H, 3).build());
        let b = view(opportunity("B").occurrence(0, H, 10).build());
        let sorted = sort_views(vec![b, a], 3);
        assert_eq!(names(&sorted), vec!["A", "B"]);
    }

    #[test]
    fn first_duration_sort_uses_earliest_occurrence() {
        // A's earliest slot is 3h long, its later one 30m.
        let a = view(
            opportunity("A")
                .occurrence(10 * H, 10 * H + H / 2, 1)
                .occurrence(0, 3 * H, 1)
                .build(),
        );
        let b = view(opportunity("B").occurrence(0, 2 * H, 1).build());
        let sorted = sort_views(vec![a, b], 4);
        assert_eq!(names(&sorted), vec!["B", "A"]);
    }

    #[test]
    fn ties_keep_source_order() {
        let views: Vec<OpportunityView> = ["A", "B", "C"]
            .iter()
            .map(|n| view(opportunity(n).organization(Ulid::new(), "Same").occurrence(0, H, 5).build()))
            .collect();
        for code in 1..=4 {
            let sorted = sort_views(views.clone(), code);
            assert_eq!(names(&sorted), vec!["A", "B", "C"], "code {code}");
        }
    }

    #[test]
    fn unknown_code_keeps_input_order() {
        let a = view(opportunity("A").occurrence(5 * H, 6 * H, 9).build());
        let b = view(opportunity("B").occurrence(0, H, 1).build());
        let sorted = sort_views(vec![a.clone(), b.clone()], 99);
        assert_eq!(sorted, vec![a, b]);
    }

    #[test]
    #[should_panic(expected = "at least one occurrence view")]
    fn start_time_sort_panics_without_occurrences() {
        let mut a = view(opportunity("A").occurrence(0, H, 1).build());
        let b = view(opportunity("B").occurrence(0, H, 1).build());
        a.occurrence_views.clear();
        let _ = sort_views(vec![a, b], 1);
    }

    #[test]
    #[should_panic(expected = "at least one occurrence view")]
    fn duration_sort_panics_without_occurrences() {
        let a = view(opportunity("A").occurrence(0, H, 1).build());
        let mut b = view(opportunity("B").occurrence(0, H, 1).build());
        b.occurrence_views.clear();
        let _ = sort_views(vec![a, b], 4);
    }

    #[test]
    #[should_panic(expected = "at least one occurrence view")]
    fn single_view_without_occurrences_still_panics() {
        let mut only = view(opportunity("A").occurrence(0, H, 1).build());
        only.occurrence_views.clear();
        let _ = sort_views(vec![only], 1);
    }

    #[test]
    fn occurrence_free_sorts_accept_empty_views() {
        let mut a = view(opportunity("A").organization(Ulid::new(), "Zed").occurrence(0, H, 1).build());
        let b = view(opportunity("B").organization(Ulid::new(), "Abe").occurrence(0, H, 1).build());
        a.occurrence_views.clear();
        let sorted = sort_views(vec![a, b], 2);
        assert_eq!(sorted[0].name, "B");
    }
}

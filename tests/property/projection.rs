//! Property-based tests for the view projections.
//!
//! Uses proptest to verify:
//! 1. The `all` filter is the identity; other filters keep order.
//! 2. Search-and-sort is idempotent and stable in both directions.
//! 3. Completed tasks are never overdue.
//! 4. Upcoming and recently completed subsets respect their limits and order.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use taskdeck::tasks::projection::{
    compare, filtered_tasks, is_overdue, recently_completed, searched_and_sorted, upcoming,
};
use taskdeck_proto::query::{Filter, SortDirection, SortField, SortSpec};
use taskdeck_proto::task::{Category, Priority, Task, TaskId, TaskStatus};

// --- Strategies ---

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap_or_default()
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_category() -> impl Strategy<Value = Category> {
    prop::sample::select(Category::ALL.to_vec())
}

/// Small value ranges so ties are common.
fn arb_fields() -> impl Strategy<Value = (String, String, Priority, TaskStatus, Category, i64, i64)>
{
    (
        "[a-cA-C]{0,3}",
        "[a-c ]{0,6}",
        arb_priority(),
        arb_status(),
        arb_category(),
        0i64..10,
        0i64..10,
    )
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(arb_fields(), 0..24).prop_map(|fields| {
        fields
            .into_iter()
            .enumerate()
            .map(
                |(i, (title, description, priority, status, category, due, touched))| Task {
                    id: TaskId::new(format!("t{i}")),
                    title,
                    description,
                    priority,
                    status,
                    category,
                    due_date: epoch() + Duration::days(due),
                    start_date: None,
                    created_at: epoch() - Duration::days(due),
                    updated_at: epoch() + Duration::hours(touched),
                },
            )
            .collect()
    })
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    prop_oneof![
        Just(Filter::All),
        arb_priority().prop_map(Filter::Priority),
        arb_status().prop_map(Filter::Status),
        arb_category().prop_map(Filter::Category),
    ]
}

fn arb_sort() -> impl Strategy<Value = SortSpec> {
    (
        prop::sample::select(vec![
            SortField::Title,
            SortField::Priority,
            SortField::DueDate,
            SortField::CreatedAt,
        ]),
        prop::sample::select(vec![SortDirection::Asc, SortDirection::Desc]),
    )
        .prop_map(|(field, direction)| SortSpec::new(field, direction))
}

fn position(set: &[Task], task: &Task) -> usize {
    set.iter().position(|t| t.id == task.id).unwrap_or(usize::MAX)
}

// --- Properties ---

proptest! {
    #[test]
    fn filter_all_is_identity(set in arb_tasks()) {
        let out = filtered_tasks(&set, Filter::All);
        prop_assert_eq!(out, set.iter().collect::<Vec<_>>());
    }

    #[test]
    fn filter_keeps_matching_in_order(set in arb_tasks(), filter in arb_filter()) {
        let out = filtered_tasks(&set, filter);
        prop_assert!(out.iter().all(|t| filter.matches(t)));
        prop_assert_eq!(out.len(), set.iter().filter(|t| filter.matches(t)).count());
        let positions: Vec<usize> = out.iter().map(|t| position(&set, t)).collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn sort_is_idempotent(set in arb_tasks(), sort in arb_sort(), term in "[a-c]{0,1}") {
        let once = searched_and_sorted(&set, &term, sort);
        let twice = searched_and_sorted(once.iter().copied(), &term, sort);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn sort_is_ordered_and_stable(set in arb_tasks(), sort in arb_sort()) {
        let out = searched_and_sorted(&set, "", sort);
        prop_assert_eq!(out.len(), set.len());
        for pair in out.windows(2) {
            let ord = compare(pair[0], pair[1], sort.field);
            match sort.direction {
                SortDirection::Asc => prop_assert_ne!(ord, Ordering::Greater),
                SortDirection::Desc => prop_assert_ne!(ord, Ordering::Less),
            }
            if ord == Ordering::Equal {
                prop_assert!(position(&set, pair[0]) < position(&set, pair[1]));
            }
        }
    }

    #[test]
    fn completed_is_never_overdue(set in arb_tasks(), offset in -30i64..30) {
        let now = epoch() + Duration::days(offset);
        for task in set.iter().filter(|t| t.status == TaskStatus::Completed) {
            prop_assert!(!is_overdue(task, now));
        }
    }

    #[test]
    fn upcoming_is_open_sorted_and_limited(set in arb_tasks(), limit in 0usize..8) {
        let out = upcoming(&set, limit);
        let open = set.iter().filter(|t| t.status != TaskStatus::Completed).count();
        prop_assert_eq!(out.len(), open.min(limit));
        prop_assert!(out.iter().all(|t| t.status != TaskStatus::Completed));
        prop_assert!(out.windows(2).all(|w| w[0].due_date <= w[1].due_date));
    }

    #[test]
    fn recently_completed_is_newest_first(set in arb_tasks(), limit in 0usize..8) {
        let out = recently_completed(&set, limit);
        prop_assert!(out.len() <= limit);
        prop_assert!(out.iter().all(|t| t.status == TaskStatus::Completed));
        prop_assert!(out.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
    }
}

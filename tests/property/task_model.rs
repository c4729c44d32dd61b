//! Property-based tests for the task entity model.
//!
//! Uses proptest to verify:
//! 1. Draft validation is total: any input yields a payload or field errors,
//!    and errors only name known fields.
//! 2. Accepted drafts are normalized (trimmed, defaults applied).
//! 3. Patches never change identity or creation time.
//! 4. Advancing status three times returns to the start.
//! 5. View filters survive a display/parse round trip.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use taskdeck_proto::draft::TaskDraft;
use taskdeck_proto::query::Filter;
use taskdeck_proto::task::{
    Category, MAX_TASK_TITLE_LENGTH, Priority, Task, TaskId, TaskPatch, TaskStatus,
};

const KNOWN_FIELDS: [&str; 4] = ["title", "dueDate", "category", "startDate"];

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 5, 12, 0, 0).single().unwrap_or_default()
}

fn arb_date_text() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9a-z:-]{0,12}",
        (2000u32..2100, 1u32..13, 1u32..29).prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}")),
        Just("2025-01-10T08:30:00Z".to_string()),
    ]
}

fn arb_draft() -> impl Strategy<Value = TaskDraft> {
    (
        prop_oneof![Just(String::new()), "[ a-zA-Z]{0,20}", "x{250,260}"],
        "[ a-z]{0,20}",
        arb_date_text(),
        prop::option::of(prop::sample::select(Category::ALL.to_vec())),
        prop::option::of(prop::sample::select(Priority::ALL.to_vec())),
        prop::option::of(arb_date_text()),
    )
        .prop_map(
            |(title, description, due_date, category, priority, start_date)| TaskDraft {
                title,
                description,
                due_date,
                category,
                priority,
                start_date,
            },
        )
}

fn arb_patch() -> impl Strategy<Value = TaskPatch> {
    (
        prop::option::of("[a-z ]{1,12}"),
        prop::option::of(prop::sample::select(TaskStatus::ALL.to_vec())),
        prop::option::of(prop::sample::select(Priority::ALL.to_vec())),
        prop::option::of(0i64..30),
    )
        .prop_map(|(title, status, priority, due)| TaskPatch {
            title,
            status,
            priority,
            due_date: due.map(|d| now() + Duration::days(d)),
            ..TaskPatch::default()
        })
}

fn arb_filter() -> impl Strategy<Value = Filter> {
    prop_oneof![
        Just(Filter::All),
        prop::sample::select(Priority::ALL.to_vec()).prop_map(Filter::Priority),
        prop::sample::select(TaskStatus::ALL.to_vec()).prop_map(Filter::Status),
        prop::sample::select(Category::ALL.to_vec()).prop_map(Filter::Category),
    ]
}

fn base_task() -> Task {
    Task {
        id: TaskId::new("t1"),
        title: "Base".to_string(),
        description: String::new(),
        priority: Priority::Low,
        status: TaskStatus::Pending,
        category: Category::Other,
        due_date: now(),
        start_date: None,
        created_at: now() - Duration::days(3),
        updated_at: now() - Duration::days(3),
    }
}

proptest! {
    #[test]
    fn validation_is_total(draft in arb_draft()) {
        match draft.validate(now()) {
            Ok(new) => {
                prop_assert_eq!(new.title.as_str(), new.title.trim());
                prop_assert!(!new.title.is_empty());
                prop_assert!(new.title.chars().count() <= MAX_TASK_TITLE_LENGTH);
                prop_assert_eq!(new.priority, draft.priority.unwrap_or(Priority::Medium));
                prop_assert_eq!(Some(new.category), draft.category);
                if draft.start_date.as_deref().is_none_or(|s| s.trim().is_empty()) {
                    prop_assert_eq!(new.start_date, now());
                }
            }
            Err(errors) => {
                prop_assert!(!errors.is_empty());
                prop_assert!(errors.iter().all(|(field, _)| KNOWN_FIELDS.contains(&field)));
            }
        }
    }

    #[test]
    fn missing_category_is_always_reported(mut draft in arb_draft()) {
        draft.category = None;
        let errors = draft.validate(now()).err();
        prop_assert!(errors.is_some_and(|e| e.get("category") == Some("Category is required")));
    }

    #[test]
    fn patch_keeps_identity(patch in arb_patch(), offset in 0i64..100) {
        let base = base_task();
        let at = now() + Duration::minutes(offset);
        let patched = patch.apply_to(&base, at);
        prop_assert_eq!(&patched.id, &base.id);
        prop_assert_eq!(patched.created_at, base.created_at);
        prop_assert_eq!(patched.updated_at, at);
        prop_assert_eq!(patched.status, patch.status.unwrap_or(base.status));
        prop_assert_eq!(patched.category, base.category);
    }

    #[test]
    fn advancing_three_times_is_identity(status in prop::sample::select(TaskStatus::ALL.to_vec())) {
        prop_assert_eq!(status.next().next().next(), status);
        prop_assert_ne!(status.next(), status);
    }

    #[test]
    fn filter_display_parses_back(filter in arb_filter()) {
        let parsed: Filter = filter
            .to_string()
            .parse()
            .map_err(|e| TestCaseError::fail(format!("{e}")))?;
        prop_assert_eq!(parsed, filter);
    }
}

use std::sync::Arc;

use super::common::*;
use crate::workflows::jobsearch::domain::TimeSlot;
use crate::workflows::jobsearch::scheduling::{SlotFinder, SlotQuery, WorkingHours};

fn finder(calendar: Arc<MemoryCalendar>) -> SlotFinder<MemoryCalendar> {
    SlotFinder::new(calendar, WorkingHours::default(), "primary".to_string())
}

fn query(proposed: Vec<chrono::NaiveDateTime>) -> SlotQuery {
    SlotQuery {
        proposed_times: proposed,
        duration_minutes: 60,
        buffer_minutes: 30,
        horizon_days: 7,
        num_slots: 3,
    }
}

#[tokio::test]
async fn free_proposed_time_is_returned() {
    let calendar = Arc::new(MemoryCalendar::default());
    let finder = finder(calendar);
    let monday_ten = dt(2026, 3, 2, 10, 0);

    let slots = finder
        .find(&query(vec![monday_ten]), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    assert_eq!(slots, vec![TimeSlot::from_start(monday_ten, 60)]);
}

#[tokio::test]
async fn busy_proposed_time_yields_empty_result() {
    let calendar = Arc::new(MemoryCalendar::default());
    let monday_ten = dt(2026, 3, 2, 10, 0);
    calendar.mark_busy(TimeSlot::from_start(monday_ten, 60));
    let finder = finder(calendar);

    let slots = finder
        .find(&query(vec![monday_ten]), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    assert!(slots.is_empty());
}

#[tokio::test]
async fn buffer_conflicts_disqualify_a_candidate() {
    let calendar = Arc::new(MemoryCalendar::default());
    // Busy 10:30-11:00; a 11:00 start with a 30 minute buffer pads back into it.
    calendar.mark_busy(TimeSlot {
        start: dt(2026, 3, 2, 10, 30),
        end: dt(2026, 3, 2, 11, 0),
    });
    let finder = finder(calendar);

    let slots = finder
        .find(&query(vec![dt(2026, 3, 2, 11, 0)]), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    assert!(slots.is_empty());
}

#[tokio::test]
async fn proposed_times_outside_working_hours_are_discarded() {
    let calendar = Arc::new(MemoryCalendar::default());
    let finder = finder(calendar);

    let slots = finder
        .find(
            &query(vec![dt(2026, 3, 2, 8, 0), dt(2026, 3, 2, 18, 30)]),
            date(2026, 3, 2),
        )
        .await
        .expect("oracle reachable");

    assert!(slots.is_empty());
}

#[tokio::test]
async fn working_hours_bounds_are_inclusive() {
    let calendar = Arc::new(MemoryCalendar::default());
    let finder = finder(calendar);

    let slots = finder
        .find(
            &query(vec![dt(2026, 3, 2, 9, 0), dt(2026, 3, 2, 17, 0)]),
            date(2026, 3, 2),
        )
        .await
        .expect("oracle reachable");

    assert_eq!(slots.len(), 2);
}

#[tokio::test]
async fn proposed_order_is_preserved_not_sorted() {
    let calendar = Arc::new(MemoryCalendar::default());
    let finder = finder(calendar);
    let later = dt(2026, 3, 4, 15, 0);
    let earlier = dt(2026, 3, 2, 10, 0);

    let slots = finder
        .find(&query(vec![later, earlier]), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    assert_eq!(
        slots,
        vec![
            TimeSlot::from_start(later, 60),
            TimeSlot::from_start(earlier, 60),
        ]
    );
}

#[tokio::test]
async fn discovery_returns_ascending_slots_and_tolerates_scarcity() {
    let calendar = Arc::new(MemoryCalendar::default());
    // Oracle only has room around Tue 09:00 and Wed 14:00 (padded windows).
    calendar.restrict_free_to(vec![
        TimeSlot {
            start: dt(2026, 3, 3, 8, 30),
            end: dt(2026, 3, 3, 10, 30),
        },
        TimeSlot {
            start: dt(2026, 3, 4, 13, 30),
            end: dt(2026, 3, 4, 15, 30),
        },
    ]);
    let finder = finder(calendar);

    let slots = finder
        .find(&query(Vec::new()), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    assert_eq!(
        slots,
        vec![
            TimeSlot::from_start(dt(2026, 3, 3, 9, 0), 60),
            TimeSlot::from_start(dt(2026, 3, 4, 14, 0), 60),
        ]
    );
}

#[tokio::test]
async fn discovery_short_circuits_once_enough_slots_found() {
    let calendar = Arc::new(MemoryCalendar::default());
    let finder = finder(calendar.clone());

    let slots = finder
        .find(&query(Vec::new()), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    assert_eq!(slots.len(), 3);
    assert_eq!(
        slots,
        vec![
            TimeSlot::from_start(dt(2026, 3, 2, 9, 0), 60),
            TimeSlot::from_start(dt(2026, 3, 2, 10, 0), 60),
            TimeSlot::from_start(dt(2026, 3, 2, 11, 0), 60),
        ]
    );
    assert_eq!(calendar.query_count(), 3, "search must stop at the cap");
}

#[tokio::test]
async fn discovered_slots_respect_working_hours_and_duration() {
    let calendar = Arc::new(MemoryCalendar::default());
    let hours = WorkingHours::default();
    let finder = finder(calendar);

    let slots = finder
        .find(&query(Vec::new()), date(2026, 3, 2))
        .await
        .expect("oracle reachable");

    for slot in slots {
        assert!(hours.contains(slot.start.time()));
        assert_eq!(slot.end - slot.start, chrono::Duration::minutes(60));
    }
}

// libs/appointment-cell/src/services/conflict.rs
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::services::time::{Interval, TimeOfDay};

/// An existing booking as seen by the conflict checker and slot generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookedSlot {
    pub appointment_id: Uuid,
    pub provider_id: Uuid,
    #[serde(flatten)]
    pub interval: BookedInterval,
    pub is_active: bool,
}

/// Serializable view of the interval a booking occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookedInterval {
    pub date: NaiveDate,
    pub time: TimeOfDay,
    pub duration_minutes: u32,
}

impl From<Interval> for BookedInterval {
    fn from(interval: Interval) -> Self {
        Self {
            date: interval.date,
            time: interval.start,
            duration_minutes: interval.duration_minutes(),
        }
    }
}

impl BookedSlot {
    pub fn new(appointment_id: Uuid, provider_id: Uuid, interval: Interval, is_active: bool) -> Self {
        Self {
            appointment_id,
            provider_id,
            interval: interval.into(),
            is_active,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.interval.date
    }

    pub fn start(&self) -> TimeOfDay {
        self.interval.time
    }

    pub fn start_minute(&self) -> u32 {
        self.interval.time.minutes() as u32
    }

    pub fn end_minute(&self) -> u32 {
        self.start_minute() + self.interval.duration_minutes
    }

    fn competes_with(&self, provider_id: Uuid, date: NaiveDate, exclude: Option<Uuid>) -> bool {
        self.is_active
            && self.provider_id == provider_id
            && self.interval.date == date
            && exclude != Some(self.appointment_id)
    }
}

/// Half-open intersection test: `[a_start, a_end)` and `[b_start, b_end)` share a minute.
/// Touching endpoints do not overlap.
pub fn intervals_overlap(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && b_start < a_end
}

/// Bookings that collide with `candidate` for `provider_id`, in input order.
///
/// Inactive bookings, other providers, other dates and the booking named by
/// `exclude` never collide, so an appointment being edited does not block itself.
pub fn find_conflicts<'a>(
    provider_id: Uuid,
    candidate: &'a Interval,
    booked: &'a [BookedSlot],
    exclude: Option<Uuid>,
) -> impl Iterator<Item = &'a BookedSlot> + 'a {
    let start = candidate.start_minute();
    let end = candidate.end_minute();

    booked.iter().filter(move |slot| {
        slot.competes_with(provider_id, candidate.date, exclude)
            && intervals_overlap(slot.start_minute(), slot.end_minute(), start, end)
    })
}

/// Stops at the first overlapping booking.
pub fn has_conflict(
    provider_id: Uuid,
    candidate: &Interval,
    booked: &[BookedSlot],
    exclude: Option<Uuid>,
) -> bool {
    find_conflicts(provider_id, candidate, booked, exclude)
        .next()
        .is_some()
}

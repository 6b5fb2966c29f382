// libs/appointment-cell/src/services/slots.rs
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::services::conflict::BookedSlot;
use crate::services::time::{enumerate_slots, parse_date, parse_time, SlotRange, TimeOfDay};

pub const DEFAULT_SLOT_INTERVAL_MINUTES: u32 = 30;

/// Opening window and slot length of one clinic day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClinicDaySchedule {
    pub open: TimeOfDay,
    pub close: TimeOfDay,
    pub interval_minutes: u32,
}

impl Default for ClinicDaySchedule {
    fn default() -> Self {
        // 8:00 AM to 5:00 PM every 30 minutes
        Self {
            open: TimeOfDay::saturating_from_minutes(8 * 60),
            close: TimeOfDay::saturating_from_minutes(17 * 60),
            interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
        }
    }
}

impl ClinicDaySchedule {
    pub fn new(open: TimeOfDay, close: TimeOfDay, interval_minutes: u32) -> Result<Self, SchedulingError> {
        if interval_minutes == 0 {
            return Err(SchedulingError::InvalidInterval);
        }
        Ok(Self { open, close, interval_minutes })
    }

    pub fn parse(open: &str, close: &str, interval_minutes: u32) -> Result<Self, SchedulingError> {
        Self::new(parse_time(open)?, parse_time(close)?, interval_minutes)
    }

    pub fn slots(&self) -> SlotRange {
        enumerate_slots(self.open, self.close, self.interval_minutes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableSlots {
    pub all: Vec<TimeOfDay>,
    pub booked: Vec<TimeOfDay>,
    pub available: Vec<TimeOfDay>,
}

/// Canonical slots of the day minus the start times of the provider's active bookings.
///
/// Only a booking's start time is subtracted: a 90 minute booking at 8:00 AM
/// leaves 8:30 AM and 9:00 AM available. Bookings that start off the slot grid
/// are still listed in `booked`.
pub fn available_slots(
    provider_id: Uuid,
    date: NaiveDate,
    schedule: &ClinicDaySchedule,
    booked: &[BookedSlot],
) -> AvailableSlots {
    let all: Vec<TimeOfDay> = schedule.slots().into_iter().collect();

    let mut taken: Vec<TimeOfDay> = booked
        .iter()
        .filter(|slot| slot.is_active && slot.provider_id == provider_id && slot.date() == date)
        .map(BookedSlot::start)
        .collect();
    taken.sort_unstable();

    let available = all
        .iter()
        .copied()
        .filter(|slot| taken.binary_search(slot).is_err())
        .collect();

    AvailableSlots {
        all,
        booked: taken,
        available,
    }
}

/// Validate the raw `provider` and `date` query parameters of an availability lookup.
pub fn resolve_slot_query(
    provider: Option<&str>,
    date: Option<&str>,
) -> Result<(Uuid, NaiveDate), SchedulingError> {
    let provider = provider
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SchedulingError::MissingParameter("provider"))?;
    let date = date
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(SchedulingError::MissingParameter("date"))?;

    let provider_id = Uuid::parse_str(provider).map_err(|_| SchedulingError::InvalidIdentifier {
        field: "provider",
        value: provider.to_string(),
    })?;

    Ok((provider_id, parse_date(date)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::time::Interval;
    use assert_matches::assert_matches;

    fn at(time: &str) -> TimeOfDay {
        parse_time(time).unwrap()
    }

    #[test]
    fn default_schedule_has_eighteen_slots() {
        let schedule = ClinicDaySchedule::default();
        assert_eq!(schedule.open, at("08:00 AM"));
        assert_eq!(schedule.close, at("05:00 PM"));
        assert_eq!(schedule.slots().len(), 18);
        assert_eq!(schedule.slots().iter().last(), Some(at("4:30 PM")));
    }

    #[test]
    fn subtracts_only_start_times() {
        let provider = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
        let schedule = ClinicDaySchedule::parse("08:00 AM", "10:00 AM", 30).unwrap();
        let long_visit = BookedSlot::new(
            Uuid::new_v4(),
            provider,
            Interval::new(date, at("08:00 AM"), 90).unwrap(),
            true,
        );

        let result = available_slots(provider, date, &schedule, &[long_visit]);
        assert_eq!(result.booked, vec![at("8:00 AM")]);
        assert_eq!(result.available, vec![at("8:30 AM"), at("9:00 AM"), at("9:30 AM")]);
    }

    #[test]
    fn off_grid_booking_is_reported_but_removes_nothing() {
        let provider = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2030, 6, 3).unwrap();
        let schedule = ClinicDaySchedule::parse("08:00 AM", "09:00 AM", 30).unwrap();
        let off_grid = BookedSlot::new(
            Uuid::new_v4(),
            provider,
            Interval::new(date, at("08:15 AM"), 15).unwrap(),
            true,
        );

        let result = available_slots(provider, date, &schedule, &[off_grid]);
        assert_eq!(result.booked, vec![at("8:15 AM")]);
        assert_eq!(result.available, result.all);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert_matches!(
            ClinicDaySchedule::parse("08:00 AM", "05:00 PM", 0),
            Err(SchedulingError::InvalidInterval)
        );
    }

    #[test]
    fn query_requires_both_parameters() {
        let provider = Uuid::new_v4().to_string();
        assert_matches!(
            resolve_slot_query(None, Some("2030-01-01")),
            Err(SchedulingError::MissingParameter("provider"))
        );
        assert_matches!(
            resolve_slot_query(Some(&provider), Some("")),
            Err(SchedulingError::MissingParameter("date"))
        );
        assert_matches!(
            resolve_slot_query(Some(&provider), Some("tomorrow")),
            Err(SchedulingError::InvalidDate(_))
        );
        assert_matches!(
            resolve_slot_query(Some("dr-house"), Some("2030-01-01")),
            Err(SchedulingError::InvalidIdentifier { field: "provider", .. })
        );
        assert!(resolve_slot_query(Some(&provider), Some("2030-01-01")).is_ok());
    }
}

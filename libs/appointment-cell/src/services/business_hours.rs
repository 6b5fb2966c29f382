// libs/appointment-cell/src/services/business_hours.rs
use crate::error::SchedulingError;
use crate::services::time::TimeOfDay;

/// Opening hours as whole 24-hour clock hours, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub start_hour: u16,
    pub end_hour: u16,
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 17,
        }
    }
}

impl BusinessHours {
    pub fn new(start_hour: u16, end_hour: u16) -> Result<Self, SchedulingError> {
        if start_hour > 24 || end_hour > 24 {
            return Err(SchedulingError::InvalidFormat(format!("{}-{}", start_hour, end_hour)));
        }
        Ok(Self { start_hour, end_hour })
    }

    /// Parse 24-hour `"HH:MM"` boundaries. Only the hour is kept.
    pub fn parse(start: &str, end: &str) -> Result<Self, SchedulingError> {
        Self::new(leading_hour(start)?, leading_hour(end)?)
    }
}

fn leading_hour(value: &str) -> Result<u16, SchedulingError> {
    let invalid = || SchedulingError::InvalidFormat(value.to_string());

    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    if minute.len() != 2 || !minute.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    hour.parse::<u16>()
        .ok()
        .filter(|hour| *hour <= 24)
        .ok_or_else(invalid)
}

/// Reject `time` when its hour is before `start_hour` or at/after `end_hour`.
///
/// Minutes are ignored on both sides, so with 08:00-17:00 a 4:59 PM start passes
/// and 5:00 PM does not, while a 17:30 end still closes at 5:00 PM.
pub fn assert_within_business_hours(time: TimeOfDay, hours: &BusinessHours) -> Result<(), SchedulingError> {
    let hour = time.hour();
    if hour < hours.start_hour || hour >= hours.end_hour {
        return Err(SchedulingError::OutOfHours {
            time: time.to_string(),
            start_hour: hours.start_hour,
            end_hour: hours.end_hour,
        });
    }
    Ok(())
}

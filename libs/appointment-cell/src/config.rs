// libs/appointment-cell/src/config.rs
use tracing::debug;

use shared_config::AppConfig;

use crate::error::SchedulingError;
use crate::services::business_hours::BusinessHours;
use crate::services::slots::ClinicDaySchedule;

/// Scheduling parameters handed to the service explicitly instead of being
/// read from the environment at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulingConfig {
    pub business_hours: BusinessHours,
    pub clinic_day: ClinicDaySchedule,
}

impl SchedulingConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SchedulingError> {
        let business_hours = BusinessHours::parse(&config.business_start_time, &config.business_end_time)?;
        let clinic_day = ClinicDaySchedule::parse(
            &config.slot_open_time,
            &config.slot_close_time,
            config.slot_interval_minutes,
        )?;

        debug!(
            "Scheduling window {}:00-{}:00, slots {} to {} every {} minutes",
            business_hours.start_hour,
            business_hours.end_hour,
            clinic_day.open,
            clinic_day.close,
            clinic_day.interval_minutes
        );

        Ok(Self {
            business_hours,
            clinic_day,
        })
    }
}

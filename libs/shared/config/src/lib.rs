use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expires_in_hours: i64,
    /// 24-hour `HH:MM` strings; only the hour part is used by the booking guard.
    pub business_start_time: String,
    pub business_end_time: String,
    /// 12-hour `HH:MM AM/PM` strings for the canonical slot grid.
    pub slot_open_time: String,
    pub slot_close_time: String,
    pub slot_interval_minutes: u32,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            jwt_secret: String::new(),
            jwt_refresh_secret: String::new(),
            jwt_expires_in_hours: 90 * 24,
            business_start_time: "08:00".to_string(),
            business_end_time: "17:00".to_string(),
            slot_open_time: "08:00 AM".to_string(),
            slot_close_time: "05:00 PM".to_string(),
            slot_interval_minutes: 30,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            jwt_refresh_secret: env::var("JWT_REFRESH_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_REFRESH_SECRET not set, using empty value");
                    String::new()
                }),
            jwt_expires_in_hours: parse_or_default("JWT_EXPIRES_IN_HOURS", defaults.jwt_expires_in_hours),
            business_start_time: env::var("BUSINESS_START_TIME")
                .unwrap_or(defaults.business_start_time),
            business_end_time: env::var("BUSINESS_END_TIME")
                .unwrap_or(defaults.business_end_time),
            slot_open_time: env::var("SLOT_OPEN_TIME")
                .unwrap_or(defaults.slot_open_time),
            slot_close_time: env::var("SLOT_CLOSE_TIME")
                .unwrap_or(defaults.slot_close_time),
            slot_interval_minutes: parse_or_default("SLOT_INTERVAL_MINUTES", defaults.slot_interval_minutes),
            port: parse_or_default("PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.jwt_secret.is_empty()
            && !self.jwt_refresh_secret.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

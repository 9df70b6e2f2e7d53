use chrono_tz::Tz;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::models::{BOOKING_CANCELLED, BOOKING_CONFIRMED, ClassStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub enable_swagger: bool,
    pub port: u16,
    pub studio_name: String,
    pub default_timezone: Tz,
    pub class_allowed_statuses: Vec<ClassStatus>,
    pub booking_allowed_statuses: Vec<String>,
    pub class_min_capacity: u32,
    pub class_max_capacity: u32,
    pub class_max_duration_hours: u32,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            enable_swagger: true,
            port: 8080,
            studio_name: "Fitness Studio".to_string(),
            default_timezone: Tz::UTC,
            class_allowed_statuses: vec![
                ClassStatus::Upcoming,
                ClassStatus::Active,
                ClassStatus::Completed,
            ],
            booking_allowed_statuses: vec![
                BOOKING_CONFIRMED.to_string(),
                BOOKING_CANCELLED.to_string(),
            ],
            class_min_capacity: 1,
            class_max_capacity: 100,
            class_max_duration_hours: 4,
            cors_origins: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_DEFAULT_TIMEZONE, APP_CLASS_MAX_CAPACITY, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("class_allowed_statuses")
                    .with_list_parse_key("booking_allowed_statuses")
                    .with_list_parse_key("cors_origins"),
            )
            .set_default("debug", false)?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("studio_name", "Fitness Studio")?
            .set_default("default_timezone", "UTC")?
            .set_default(
                "class_allowed_statuses",
                vec!["upcoming", "active", "completed"],
            )?
            .set_default("booking_allowed_statuses", vec!["confirmed", "cancelled"])?
            .set_default("class_min_capacity", 1)?
            .set_default("class_max_capacity", 100)?
            .set_default("class_max_duration_hours", 4)?
            .build()?;

        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Startup checks that cannot be expressed through the types alone.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.class_min_capacity == 0 {
            return Err(ConfigError::Message(
                "class_min_capacity must be at least 1".into(),
            ));
        }
        if self.class_min_capacity > self.class_max_capacity {
            return Err(ConfigError::Message(format!(
                "class_min_capacity ({}) exceeds class_max_capacity ({})",
                self.class_min_capacity, self.class_max_capacity
            )));
        }
        if self.class_max_duration_hours == 0 {
            return Err(ConfigError::Message(
                "class_max_duration_hours must be positive".into(),
            ));
        }
        if self.class_allowed_statuses.is_empty() {
            return Err(ConfigError::Message(
                "class_allowed_statuses must not be empty".into(),
            ));
        }
        for required in [BOOKING_CONFIRMED, BOOKING_CANCELLED] {
            if !self.booking_allowed_statuses.iter().any(|s| s == required) {
                return Err(ConfigError::Message(format!(
                    "booking_allowed_statuses must contain '{required}'"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 4] = [
        "APP_DEFAULT_TIMEZONE",
        "APP_CLASS_MAX_CAPACITY",
        "APP_BOOKING_ALLOWED_STATUSES",
        "APP_CLASS_ALLOWED_STATUSES",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.default_timezone, Tz::UTC);
        assert_eq!(settings.class_allowed_statuses.len(), 3);
        assert_eq!(settings.booking_allowed_statuses, vec!["confirmed", "cancelled"]);
        assert_eq!(settings.class_max_capacity, 100);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        unsafe {
            std::env::set_var("APP_DEFAULT_TIMEZONE", "Asia/Kolkata");
            std::env::set_var("APP_CLASS_MAX_CAPACITY", "30");
            std::env::set_var("APP_BOOKING_ALLOWED_STATUSES", "confirmed,cancelled,attended");
        }
        let settings = Settings::from_env().unwrap();
        clear_env();
        assert_eq!(settings.default_timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(settings.class_max_capacity, 30);
        assert_eq!(settings.booking_allowed_statuses.len(), 3);
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_timezone() {
        clear_env();
        unsafe { std::env::set_var("APP_DEFAULT_TIMEZONE", "Mars/Olympus") };
        let result = Settings::from_env();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_class_status() {
        clear_env();
        unsafe { std::env::set_var("APP_CLASS_ALLOWED_STATUSES", "upcoming,paused") };
        let result = Settings::from_env();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_capacity_bounds() {
        let settings = Settings {
            class_min_capacity: 50,
            class_max_capacity: 10,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_requires_core_booking_statuses() {
        let settings = Settings {
            booking_allowed_statuses: vec!["confirmed".to_string()],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
        assert!(Settings::default().validate().is_ok());
    }
}

//! Class status transitions and slot accounting.
//!
//! The clock drives a class forward through `upcoming -> active -> completed`.
//! The sweep only moves classes forward; fetching a single class realigns it
//! with the clock in either direction. Slot counts change only through [`ClassLifecycle::adjust_slots`],
//! which delegates to the store's atomic conditional update.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::models::{ClassDraft, ClassStatus, ClassType, FitnessClass, NewClass};
use crate::settings::Settings;
use crate::store::{ClassQuery, ClassStore};
use crate::timezone::{convert, parse_timezone};
use crate::validation::{validate_capacity, validate_name};

pub const MIN_CLASS_DURATION_MINUTES: i64 = 30;

/// Operator-configured limits applied when classes are created.
#[derive(Debug, Clone)]
pub struct ClassPolicy {
    pub default_timezone: Tz,
    pub allowed_statuses: Vec<ClassStatus>,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub max_duration: Duration,
}

impl From<&Settings> for ClassPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            default_timezone: settings.default_timezone,
            allowed_statuses: settings.class_allowed_statuses.clone(),
            min_capacity: settings.class_min_capacity,
            max_capacity: settings.class_max_capacity,
            max_duration: Duration::hours(i64::from(settings.class_max_duration_hours)),
        }
    }
}

pub struct ClassLifecycle {
    store: Arc<dyn ClassStore>,
    policy: ClassPolicy,
}

impl ClassLifecycle {
    pub fn new(store: Arc<dyn ClassStore>, policy: ClassPolicy) -> Self {
        Self { store, policy }
    }

    /// Moves every class whose stored status lags the clock forward. Returns
    /// how many classes changed; running it twice at the same `now` changes
    /// nothing the second time.
    pub async fn reconcile_statuses(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        let mut changed = 0;
        for status in [ClassStatus::Upcoming, ClassStatus::Active] {
            for class in self
                .store
                .list_classes(&ClassQuery::with_status(status))
                .await?
            {
                let target = class.effective_status(now);
                if target <= class.status {
                    continue;
                }
                if self
                    .store
                    .compare_and_set_status(class.id, class.status, target)
                    .await?
                    .is_some()
                {
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            debug!(changed, "reconciled class statuses");
        }
        Ok(changed)
    }

    /// Fetches a class, first aligning its stored status with the clock if
    /// the two differ. Unlike the sweep this also corrects a status supplied
    /// at creation that runs ahead of the schedule.
    pub async fn get_class(&self, id: i64, now: DateTime<Utc>) -> Result<FitnessClass, ServiceError> {
        let class = self
            .store
            .get_class(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Class with ID {id} not found")))?;

        let target = class.effective_status(now);
        if target == class.status {
            return Ok(class);
        }
        match self
            .store
            .compare_and_set_status(id, class.status, target)
            .await?
        {
            Some(updated) => {
                debug!(class_id = id, status = %target, "refreshed class status");
                Ok(updated)
            }
            // Another caller moved it first; read what they wrote.
            None => self
                .store
                .get_class(id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Class with ID {id} not found"))),
        }
    }

    /// Reserves (`delta < 0`) or releases (`delta > 0`) slots. The bound
    /// `0 <= available_slots <= capacity` is checked atomically by the store.
    pub async fn adjust_slots(
        &self,
        id: i64,
        delta: i32,
        now: DateTime<Utc>,
    ) -> Result<FitnessClass, ServiceError> {
        self.get_class(id, now).await?;
        let class = self.store.adjust_slots(id, delta).await.map_err(|err| {
            warn!(class_id = id, delta, error = %err, "slot adjustment rejected");
            ServiceError::from(err)
        })?;
        debug!(
            class_id = id,
            delta,
            available_slots = class.available_slots,
            "adjusted class slots"
        );
        Ok(class)
    }

    pub async fn create_class(
        &self,
        draft: ClassDraft,
        now: DateTime<Utc>,
    ) -> Result<FitnessClass, ServiceError> {
        let new_class = self.prepare(draft)?;

        let existing = self
            .store
            .find_overlapping(&new_class.name, &new_class.start_time, &new_class.end_time)
            .await?;
        if !existing.is_empty() {
            warn!(name = %new_class.name, "rejected overlapping class");
            return Err(ServiceError::Conflict(
                "A class with the same name and overlapping time already exists.".into(),
            ));
        }

        let class = self.store.insert_class(new_class).await?;
        info!(
            class_id = class.id,
            name = %class.name,
            starts_in_minutes = (class.start_time.with_timezone(&Utc) - now).num_minutes(),
            "created class"
        );
        Ok(class)
    }

    /// Validates a draft and resolves its times into the class timezone.
    fn prepare(&self, draft: ClassDraft) -> Result<NewClass, ServiceError> {
        let name = validate_name("name", &draft.name)?;
        let instructor = validate_name("instructor", &draft.instructor)?;
        let capacity = validate_capacity(
            draft.capacity,
            self.policy.min_capacity,
            self.policy.max_capacity,
        )?;

        let timezone = match draft.timezone.as_deref() {
            Some(name) => parse_timezone(name)?,
            None => self.policy.default_timezone,
        };
        let class_type = draft
            .class_type
            .parse::<ClassType>()
            .map_err(ServiceError::Validation)?;
        let status = match draft.status.as_deref() {
            Some(raw) => raw.parse::<ClassStatus>().map_err(ServiceError::Validation)?,
            None => ClassStatus::Upcoming,
        };
        if !self.policy.allowed_statuses.contains(&status) {
            return Err(ServiceError::Validation(format!(
                "Status '{status}' is not allowed for new classes"
            )));
        }

        let start_time = draft
            .start_time
            .resolve(self.policy.default_timezone, timezone)?;
        let end_time = draft
            .end_time
            .resolve(self.policy.default_timezone, timezone)?;
        if end_time <= start_time {
            return Err(ServiceError::Validation(
                "end_time must be after start_time".into(),
            ));
        }
        let duration = end_time - start_time;
        if duration < Duration::minutes(MIN_CLASS_DURATION_MINUTES) {
            return Err(ServiceError::Validation(format!(
                "Class duration must be at least {MIN_CLASS_DURATION_MINUTES} minutes"
            )));
        }
        if duration > self.policy.max_duration {
            return Err(ServiceError::Validation(format!(
                "Class duration must be at most {} hours",
                self.policy.max_duration.num_hours()
            )));
        }

        Ok(NewClass {
            name,
            class_type,
            instructor,
            start_time,
            end_time,
            capacity,
            status,
            timezone: timezone.name().to_string(),
        })
    }

    /// Bookable classes starting after `now`, earliest first, with times
    /// expressed in each class's own timezone.
    pub async fn list_upcoming(
        &self,
        class_type: Option<ClassType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FitnessClass>, ServiceError> {
        self.reconcile_statuses(now).await?;

        let query = ClassQuery {
            status: Some(ClassStatus::Upcoming),
            class_type,
            starts_after: Some(now),
        };
        let mut classes = self.store.list_classes(&query).await?;
        for class in &mut classes {
            match parse_timezone(&class.timezone) {
                Ok(tz) => {
                    class.start_time = convert(&class.start_time, tz);
                    class.end_time = convert(&class.end_time, tz);
                }
                Err(err) => warn!(class_id = class.id, error = %err, "stored timezone unreadable"),
            }
        }
        debug!(count = classes.len(), "listed upcoming classes");
        Ok(classes)
    }

    /// Deletes a class that has no confirmed bookings; its cancelled bookings
    /// go with it.
    pub async fn delete_class(&self, id: i64, now: DateTime<Utc>) -> Result<(), ServiceError> {
        self.get_class(id, now).await?;
        self.store.delete_class(id).await?;
        info!(class_id = id, "deleted class");
        Ok(())
    }
}

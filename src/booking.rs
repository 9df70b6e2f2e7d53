//! Booking creation, status changes and deletion.
//!
//! A confirmed booking always owns exactly one slot on its class. Slots are
//! reserved before a booking write and released after it; a reservation is
//! reverted if the write fails or loses a concurrent status change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::error::ServiceError;
use crate::lifecycle::ClassLifecycle;
use crate::models::{
    BOOKING_CONFIRMED, Booking, BookingDetails, BookingRequest, ClassStatus, NewBooking,
    holds_slot,
};
use crate::settings::Settings;
use crate::store::BookingStore;
use crate::validation::{validate_email, validate_name};

const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub allowed_statuses: Vec<String>,
}

impl From<&Settings> for BookingPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            allowed_statuses: settings.booking_allowed_statuses.clone(),
        }
    }
}

pub struct BookingWorkflow {
    classes: Arc<ClassLifecycle>,
    store: Arc<dyn BookingStore>,
    policy: BookingPolicy,
}

impl BookingWorkflow {
    pub fn new(
        classes: Arc<ClassLifecycle>,
        store: Arc<dyn BookingStore>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            classes,
            store,
            policy,
        }
    }

    pub async fn create_booking(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<BookingDetails, ServiceError> {
        let client_name = validate_name("Client name", &request.client_name)?;
        let client_email = validate_email(&request.client_email)?;
        let class_id = request.class_id;

        self.classes.reconcile_statuses(now).await?;
        let class = self.classes.get_class(class_id, now).await?;

        if class.status != ClassStatus::Upcoming {
            warn!(class_id, status = %class.status, "booking rejected for non-upcoming class");
            return Err(ServiceError::InvalidState(format!(
                "Cannot book a class with status: {}",
                class.status
            )));
        }
        if class.available_slots == 0 {
            warn!(class_id, "booking rejected, class is full");
            return Err(ServiceError::Capacity(
                "No available slots in this class".into(),
            ));
        }
        if self
            .store
            .find_booking(class_id, &client_email)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(
                "You have already booked this class.".into(),
            ));
        }

        let class = self.classes.adjust_slots(class_id, -1, now).await?;
        let inserted = self
            .store
            .insert_booking(NewBooking {
                class_id,
                client_name,
                client_email,
                booking_time: now,
                status: BOOKING_CONFIRMED.to_string(),
            })
            .await;
        let booking = match inserted {
            Ok(booking) => booking,
            Err(err) => {
                self.revert_slots(class_id, 1, now).await;
                return Err(err.into());
            }
        };

        info!(booking_id = booking.id, class_id, "created booking");
        Ok(BookingDetails::new(booking, &class))
    }

    /// Bookings of one client, newest first. Bookings whose class has
    /// disappeared are left out.
    pub async fn get_bookings_by_email(
        &self,
        email: &str,
        status: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<BookingDetails>, ServiceError> {
        if !email.contains('@') {
            warn!(email, "invalid email format");
            return Err(ServiceError::Validation("Invalid email format".into()));
        }
        let email = email.trim().to_lowercase();

        let bookings = self.store.list_bookings_by_email(&email, status).await?;
        let classes = join_all(
            bookings
                .iter()
                .map(|booking| self.classes.get_class(booking.class_id, now)),
        )
        .await;

        let mut details = Vec::with_capacity(bookings.len());
        for (booking, class) in bookings.into_iter().zip(classes) {
            match class {
                Ok(class) => details.push(BookingDetails::new(booking, &class)),
                Err(ServiceError::NotFound(msg)) => {
                    warn!(booking_id = booking.id, "skipping booking: {msg}");
                }
                Err(err) => return Err(err),
            }
        }
        debug!(count = details.len(), status, "listed bookings by email");
        Ok(details)
    }

    pub async fn get_booking(&self, id: i64) -> Result<Booking, ServiceError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Booking with ID {id} not found")))
    }

    /// Moves a booking to `new_status`. A slot is reserved before the status
    /// write and released only after it, so a confirmed booking never lacks
    /// its slot. The write is conditional on the status read; a concurrent
    /// change makes it start over from the fresh record.
    pub async fn update_booking_status(
        &self,
        id: i64,
        new_status: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking, ServiceError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let booking = self.get_booking(id).await?;
            if booking.status == new_status {
                return Ok(booking);
            }
            if !self.policy.allowed_statuses.iter().any(|s| s == new_status) {
                warn!(booking_id = id, new_status, "invalid booking status");
                return Err(ServiceError::Validation(format!(
                    "Invalid status. Must be one of: {}",
                    self.policy.allowed_statuses.join(", ")
                )));
            }

            let reserves = !booking.holds_slot() && holds_slot(new_status);
            let releases = booking.holds_slot() && !holds_slot(new_status);
            if reserves {
                let class = self.classes.get_class(booking.class_id, now).await?;
                if class.available_slots == 0 {
                    warn!(booking_id = id, class_id = class.id, "cannot re-confirm, class is full");
                    return Err(ServiceError::Capacity(
                        "Cannot re-confirm booking: no available slots".into(),
                    ));
                }
                self.classes.adjust_slots(booking.class_id, -1, now).await?;
            }

            let written = self
                .store
                .compare_and_set_booking_status(id, &booking.status, new_status)
                .await;
            let updated = match written {
                Ok(Some(updated)) => updated,
                Ok(None) => {
                    if reserves {
                        self.revert_slots(booking.class_id, 1, now).await;
                    }
                    debug!(booking_id = id, "booking status changed concurrently, retrying");
                    continue;
                }
                Err(err) => {
                    if reserves {
                        self.revert_slots(booking.class_id, 1, now).await;
                    }
                    return Err(err.into());
                }
            };

            if releases {
                if let Err(err) = self.classes.adjust_slots(booking.class_id, 1, now).await {
                    self.restore_status(id, new_status, &booking.status).await;
                    return Err(err);
                }
            }
            debug!(booking_id = id, from = %booking.status, to = new_status, "updated booking status");
            return Ok(updated);
        }

        warn!(booking_id = id, "gave up updating contended booking");
        Err(ServiceError::Conflict(
            "Booking was modified concurrently, please retry".into(),
        ))
    }

    /// Deletes a booking, returning its slot if it held one. The delete is
    /// conditional on the status read, so only the caller that removed a
    /// confirmed booking releases its slot.
    pub async fn delete_booking(&self, id: i64, now: DateTime<Utc>) -> Result<(), ServiceError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let booking = self.get_booking(id).await?;
            let Some(deleted) = self.store.delete_booking(id, &booking.status).await? else {
                debug!(booking_id = id, "booking status changed concurrently, retrying delete");
                continue;
            };

            if deleted.holds_slot() {
                if let Err(err) = self.classes.adjust_slots(deleted.class_id, 1, now).await {
                    error!(booking_id = id, class_id = deleted.class_id, error = %err, "failed to release slot of deleted booking");
                    return Err(err);
                }
            }
            info!(booking_id = id, class_id = deleted.class_id, "deleted booking");
            return Ok(());
        }

        warn!(booking_id = id, "gave up deleting contended booking");
        Err(ServiceError::Conflict(
            "Booking was modified concurrently, please retry".into(),
        ))
    }

    /// Puts a booking back to `previous` after its slot release failed.
    async fn restore_status(&self, id: i64, current: &str, previous: &str) {
        match self
            .store
            .compare_and_set_booking_status(id, current, previous)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => error!(booking_id = id, "booking changed before its status could be restored"),
            Err(err) => error!(booking_id = id, error = %err, "failed to restore booking status"),
        }
    }

    /// Compensating slot change after a failed booking write.
    async fn revert_slots(&self, class_id: i64, delta: i32, now: DateTime<Utc>) {
        if let Err(err) = self.classes.adjust_slots(class_id, delta, now).await {
            error!(class_id, delta, error = %err, "failed to revert slot change");
        }
    }
}

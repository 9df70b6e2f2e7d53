//! Record stores for classes and bookings.
//!
//! Every conditional write (slot adjustment, status compare-and-set, unique
//! booking insert, overlap-guarded class insert, guarded class delete) is a
//! single operation on the store, so callers never split a check from the
//! write it guards.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{
    Booking, BOOKING_CONFIRMED, ClassStatus, ClassType, FitnessClass, NewBooking, NewClass,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("class {0} not found")]
    ClassNotFound(i64),
    #[error("booking {0} not found")]
    BookingNotFound(i64),
    #[error("slot change of {delta} out of range for class {class_id}")]
    SlotsOutOfRange { class_id: i64, delta: i32 },
    #[error("booking for class {class_id} by {client_email} already exists")]
    DuplicateBooking { class_id: i64, client_email: String },
    #[error("class '{name}' overlaps an existing class with the same name")]
    OverlappingClass { name: String },
    #[error("class {class_id} has {confirmed} confirmed booking(s)")]
    ClassInUse { class_id: i64, confirmed: usize },
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Filter for [`ClassStore::list_classes`]. Results are ordered by start time.
#[derive(Debug, Clone, Default)]
pub struct ClassQuery {
    pub status: Option<ClassStatus>,
    pub class_type: Option<ClassType>,
    pub starts_after: Option<DateTime<Utc>>,
}

impl ClassQuery {
    pub fn with_status(status: ClassStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn matches(&self, class: &FitnessClass) -> bool {
        self.status.is_none_or(|s| class.status == s)
            && self.class_type.is_none_or(|t| class.class_type == t)
            && self.starts_after.is_none_or(|after| class.start_time > after)
    }
}

#[async_trait]
pub trait ClassStore: Send + Sync + 'static {
    async fn get_class(&self, id: i64) -> Result<Option<FitnessClass>, StoreError>;

    async fn list_classes(&self, query: &ClassQuery) -> Result<Vec<FitnessClass>, StoreError>;

    /// Classes named `name` whose `[start, end)` interval intersects the given one.
    async fn find_overlapping(
        &self,
        name: &str,
        start: &DateTime<FixedOffset>,
        end: &DateTime<FixedOffset>,
    ) -> Result<Vec<FitnessClass>, StoreError>;

    /// Inserts with `available_slots = capacity`. Fails with
    /// `OverlappingClass` if a same-named class overlaps.
    async fn insert_class(&self, class: NewClass) -> Result<FitnessClass, StoreError>;

    /// Sets `status` to `next` only if it is still `expected`. Returns `None`
    /// when the stored status no longer matches.
    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: ClassStatus,
        next: ClassStatus,
    ) -> Result<Option<FitnessClass>, StoreError>;

    /// Adds `delta` to `available_slots`, failing with `SlotsOutOfRange` if the
    /// result would leave `0..=capacity`.
    async fn adjust_slots(&self, id: i64, delta: i32) -> Result<FitnessClass, StoreError>;

    /// Removes the class together with its non-confirmed bookings. Fails with
    /// `ClassInUse` while confirmed bookings reference it.
    async fn delete_class(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    async fn get_booking(&self, id: i64) -> Result<Option<Booking>, StoreError>;

    async fn find_booking(
        &self,
        class_id: i64,
        client_email: &str,
    ) -> Result<Option<Booking>, StoreError>;

    /// Fails with `DuplicateBooking` if (class_id, client_email) is taken and
    /// with `ClassNotFound` if the class does not exist.
    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    /// Sets `status` to `next` only if it is still `expected`. Returns `None`
    /// when the stored status no longer matches.
    async fn compare_and_set_booking_status(
        &self,
        id: i64,
        expected: &str,
        next: &str,
    ) -> Result<Option<Booking>, StoreError>;

    /// Removes the booking only if its status is still `expected`. Returns
    /// `None` when the stored status no longer matches.
    async fn delete_booking(&self, id: i64, expected: &str) -> Result<Option<Booking>, StoreError>;

    /// Newest booking first.
    async fn list_bookings_by_email(
        &self,
        client_email: &str,
        status: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    classes: BTreeMap<i64, FitnessClass>,
    bookings: BTreeMap<i64, Booking>,
    next_class_id: i64,
    next_booking_id: i64,
}

/// In-process store of record backing both record types with one lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClassStore for MemoryStore {
    async fn get_class(&self, id: i64) -> Result<Option<FitnessClass>, StoreError> {
        Ok(self.tables.read().await.classes.get(&id).cloned())
    }

    async fn list_classes(&self, query: &ClassQuery) -> Result<Vec<FitnessClass>, StoreError> {
        let tables = self.tables.read().await;
        let mut classes: Vec<FitnessClass> = tables
            .classes
            .values()
            .filter(|c| query.matches(c))
            .cloned()
            .collect();
        classes.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(classes)
    }

    async fn find_overlapping(
        &self,
        name: &str,
        start: &DateTime<FixedOffset>,
        end: &DateTime<FixedOffset>,
    ) -> Result<Vec<FitnessClass>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .classes
            .values()
            .filter(|c| c.name == name && c.overlaps(start, end))
            .cloned()
            .collect())
    }

    async fn insert_class(&self, class: NewClass) -> Result<FitnessClass, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .classes
            .values()
            .any(|c| c.name == class.name && c.overlaps(&class.start_time, &class.end_time))
        {
            return Err(StoreError::OverlappingClass { name: class.name });
        }

        tables.next_class_id += 1;
        let now = Utc::now();
        let record = FitnessClass {
            id: tables.next_class_id,
            name: class.name,
            class_type: class.class_type,
            instructor: class.instructor,
            start_time: class.start_time,
            end_time: class.end_time,
            capacity: class.capacity,
            available_slots: class.capacity,
            status: class.status,
            timezone: class.timezone,
            created_at: now,
            updated_at: now,
        };
        tables.classes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn compare_and_set_status(
        &self,
        id: i64,
        expected: ClassStatus,
        next: ClassStatus,
    ) -> Result<Option<FitnessClass>, StoreError> {
        let mut tables = self.tables.write().await;
        let class = tables
            .classes
            .get_mut(&id)
            .ok_or(StoreError::ClassNotFound(id))?;
        if class.status != expected {
            return Ok(None);
        }
        class.status = next;
        class.updated_at = Utc::now();
        Ok(Some(class.clone()))
    }

    async fn adjust_slots(&self, id: i64, delta: i32) -> Result<FitnessClass, StoreError> {
        let mut tables = self.tables.write().await;
        let class = tables
            .classes
            .get_mut(&id)
            .ok_or(StoreError::ClassNotFound(id))?;
        let next = i64::from(class.available_slots) + i64::from(delta);
        let slots = u32::try_from(next)
            .ok()
            .filter(|slots| *slots <= class.capacity)
            .ok_or(StoreError::SlotsOutOfRange {
                class_id: id,
                delta,
            })?;
        class.available_slots = slots;
        class.updated_at = Utc::now();
        Ok(class.clone())
    }

    async fn delete_class(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.classes.contains_key(&id) {
            return Err(StoreError::ClassNotFound(id));
        }
        let confirmed = tables
            .bookings
            .values()
            .filter(|b| b.class_id == id && b.status == BOOKING_CONFIRMED)
            .count();
        if confirmed > 0 {
            return Err(StoreError::ClassInUse {
                class_id: id,
                confirmed,
            });
        }
        tables.bookings.retain(|_, b| b.class_id != id);
        tables.classes.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn get_booking(&self, id: i64) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_booking(
        &self,
        class_id: i64,
        client_email: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.class_id == class_id && b.client_email == client_email)
            .cloned())
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.classes.contains_key(&booking.class_id) {
            return Err(StoreError::ClassNotFound(booking.class_id));
        }
        if tables
            .bookings
            .values()
            .any(|b| b.class_id == booking.class_id && b.client_email == booking.client_email)
        {
            return Err(StoreError::DuplicateBooking {
                class_id: booking.class_id,
                client_email: booking.client_email,
            });
        }

        tables.next_booking_id += 1;
        let now = Utc::now();
        let record = Booking {
            id: tables.next_booking_id,
            class_id: booking.class_id,
            client_name: booking.client_name,
            client_email: booking.client_email,
            booking_time: booking.booking_time,
            status: booking.status,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn compare_and_set_booking_status(
        &self,
        id: i64,
        expected: &str,
        next: &str,
    ) -> Result<Option<Booking>, StoreError> {
        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or(StoreError::BookingNotFound(id))?;
        if booking.status != expected {
            return Ok(None);
        }
        booking.status = next.to_string();
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn delete_booking(&self, id: i64, expected: &str) -> Result<Option<Booking>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.bookings.get(&id) {
            None => Err(StoreError::BookingNotFound(id)),
            Some(booking) if booking.status != expected => Ok(None),
            Some(_) => Ok(tables.bookings.remove(&id)),
        }
    }

    async fn list_bookings_by_email(
        &self,
        client_email: &str,
        status: Option<&str>,
    ) -> Result<Vec<Booking>, StoreError> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.client_email == client_email)
            .filter(|b| status.is_none_or(|s| b.status == s))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booking_time.cmp(&a.booking_time).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn new_class(name: &str, start_hour: u32, end_hour: u32, capacity: u32) -> NewClass {
        let utc = FixedOffset::east_opt(0).unwrap();
        NewClass {
            name: name.to_string(),
            class_type: ClassType::Yoga,
            instructor: "Asha".to_string(),
            start_time: utc.with_ymd_and_hms(2030, 1, 1, start_hour, 0, 0).unwrap(),
            end_time: utc.with_ymd_and_hms(2030, 1, 1, end_hour, 0, 0).unwrap(),
            capacity,
            status: ClassStatus::Upcoming,
            timezone: "UTC".to_string(),
        }
    }

    fn new_booking(class_id: i64, email: &str) -> NewBooking {
        NewBooking {
            class_id,
            client_name: "Client".to_string(),
            client_email: email.to_string(),
            booking_time: Utc::now(),
            status: BOOKING_CONFIRMED.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_class_starts_full() {
        let store = MemoryStore::new();
        let class = store.insert_class(new_class("Yoga AM", 10, 11, 5)).await.unwrap();
        assert_eq!(class.id, 1);
        assert_eq!(class.available_slots, 5);
    }

    #[tokio::test]
    async fn test_insert_class_rejects_overlap() {
        let store = MemoryStore::new();
        store.insert_class(new_class("Yoga AM", 10, 11, 5)).await.unwrap();
        let err = store
            .insert_class(new_class("Yoga AM", 10, 12, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OverlappingClass { .. }));
        assert!(store.insert_class(new_class("Yoga AM", 11, 12, 5)).await.is_ok());
        assert!(store.insert_class(new_class("Zumba", 10, 11, 5)).await.is_ok());
    }

    #[tokio::test]
    async fn test_adjust_slots_bounds() {
        let store = MemoryStore::new();
        let class = store.insert_class(new_class("HIIT", 10, 11, 1)).await.unwrap();

        let err = store.adjust_slots(class.id, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::SlotsOutOfRange { delta: 1, .. }));

        let updated = store.adjust_slots(class.id, -1).await.unwrap();
        assert_eq!(updated.available_slots, 0);

        let err = store.adjust_slots(class.id, -1).await.unwrap_err();
        assert!(matches!(err, StoreError::SlotsOutOfRange { delta: -1, .. }));

        let stored = store.get_class(class.id).await.unwrap().unwrap();
        assert_eq!(stored.available_slots, 0);
    }

    #[tokio::test]
    async fn test_compare_and_set_status() {
        let store = MemoryStore::new();
        let class = store.insert_class(new_class("HIIT", 10, 11, 1)).await.unwrap();
        let moved = store
            .compare_and_set_status(class.id, ClassStatus::Upcoming, ClassStatus::Active)
            .await
            .unwrap();
        assert_eq!(moved.unwrap().status, ClassStatus::Active);
        let stale = store
            .compare_and_set_status(class.id, ClassStatus::Upcoming, ClassStatus::Completed)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_insert_booking_unique_per_class_and_email() {
        let store = MemoryStore::new();
        let class = store.insert_class(new_class("HIIT", 10, 11, 5)).await.unwrap();
        store.insert_booking(new_booking(class.id, "a@x.com")).await.unwrap();
        let err = store
            .insert_booking(new_booking(class.id, "a@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBooking { .. }));

        let err = store.insert_booking(new_booking(99, "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::ClassNotFound(99)));
    }

    #[tokio::test]
    async fn test_delete_class_guarded_by_confirmed_bookings() {
        let store = MemoryStore::new();
        let class = store.insert_class(new_class("HIIT", 10, 11, 5)).await.unwrap();
        let booking = store.insert_booking(new_booking(class.id, "a@x.com")).await.unwrap();

        let err = store.delete_class(class.id).await.unwrap_err();
        assert!(matches!(err, StoreError::ClassInUse { confirmed: 1, .. }));

        store
            .compare_and_set_booking_status(booking.id, BOOKING_CONFIRMED, "cancelled")
            .await
            .unwrap();
        store.delete_class(class.id).await.unwrap();
        assert!(store.get_class(class.id).await.unwrap().is_none());
        assert!(store.get_booking(booking.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_bookings_by_email_newest_first() {
        let store = MemoryStore::new();
        let first = store.insert_class(new_class("A", 10, 11, 5)).await.unwrap();
        let second = store.insert_class(new_class("B", 10, 11, 5)).await.unwrap();

        let mut older = new_booking(first.id, "a@x.com");
        older.booking_time = Utc.with_ymd_and_hms(2029, 1, 1, 0, 0, 0).unwrap();
        store.insert_booking(older).await.unwrap();
        let mut newer = new_booking(second.id, "a@x.com");
        newer.booking_time = Utc.with_ymd_and_hms(2029, 6, 1, 0, 0, 0).unwrap();
        newer.status = "cancelled".to_string();
        store.insert_booking(newer).await.unwrap();

        let all = store.list_bookings_by_email("a@x.com", None).await.unwrap();
        assert_eq!(
            all.iter().map(|b| b.class_id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
        let confirmed = store
            .list_bookings_by_email("a@x.com", Some("confirmed"))
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
    }

    #[tokio::test]
    async fn test_booking_writes_are_conditional_on_status() {
        let store = MemoryStore::new();
        let class = store.insert_class(new_class("HIIT", 10, 11, 5)).await.unwrap();
        let booking = store.insert_booking(new_booking(class.id, "a@x.com")).await.unwrap();

        let cancelled = store
            .compare_and_set_booking_status(booking.id, BOOKING_CONFIRMED, "cancelled")
            .await
            .unwrap();
        assert_eq!(cancelled.unwrap().status, "cancelled");
        let stale = store
            .compare_and_set_booking_status(booking.id, BOOKING_CONFIRMED, "cancelled")
            .await
            .unwrap();
        assert!(stale.is_none());

        assert!(store
            .delete_booking(booking.id, BOOKING_CONFIRMED)
            .await
            .unwrap()
            .is_none());
        assert!(store.get_booking(booking.id).await.unwrap().is_some());
        assert!(store
            .delete_booking(booking.id, "cancelled")
            .await
            .unwrap()
            .is_some());
        assert!(matches!(
            store.delete_booking(booking.id, "cancelled").await.unwrap_err(),
            StoreError::BookingNotFound(_)
        ));
    }
}

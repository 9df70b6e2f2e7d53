use chrono::Utc;
use icalendar::{Calendar, Component, Event, EventLike};

use crate::models::FitnessClass;
use crate::timezone::{format_in, parse_timezone};

#[derive(Clone, Default)]
pub struct ICalExporter;

impl ICalExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, calendar_name: &str, classes: &[FitnessClass]) -> Vec<u8> {
        if classes.is_empty() {
            return Vec::new();
        }

        let mut calendar = Calendar::new();
        calendar.name(calendar_name);

        for class in classes {
            let mut event = Event::new();
            event.summary(&format!("{}: {}", class.class_type.label(), class.name));
            event.starts(class.start_time.with_timezone(&Utc));
            event.ends(class.end_time.with_timezone(&Utc));
            event.location(calendar_name);
            let local_start = parse_timezone(&class.timezone)
                .map(|tz| format_in(&class.start_time, tz))
                .unwrap_or_else(|_| class.start_time.to_rfc3339());
            event.description(&format!(
                "Starts: {}\nFree slots: {}/{}\nInstructor: {}",
                local_start, class.available_slots, class.capacity, class.instructor
            ));
            event.uid(&format!("class-{}-{}", class.id, class.start_time.format("%Y%m%dT%H%M%S")));
            calendar.push(event);
        }

        calendar.to_string().into_bytes()
    }
}

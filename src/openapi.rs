use utoipa::OpenApi;

use crate::models::{
    Booking, BookingDetails, BookingRequest, BookingStatusUpdate, ClassDraft, ClassStatus,
    ClassType, FitnessClass,
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Fitness Studio Booking API", description = "Book clients into fitness classes without overbooking"),
    paths(
        crate::handlers::root,
        crate::handlers::healthz_live,
        crate::handlers::healthz_ready,
        crate::handlers::create_class,
        crate::handlers::list_classes,
        crate::handlers::get_ical,
        crate::handlers::get_class,
        crate::handlers::delete_class,
        crate::handlers::create_booking,
        crate::handlers::list_bookings,
        crate::handlers::update_booking,
        crate::handlers::delete_booking
    ),
    components(schemas(
        FitnessClass,
        ClassDraft,
        ClassType,
        ClassStatus,
        Booking,
        BookingRequest,
        BookingStatusUpdate,
        BookingDetails
    )),
    tags(
        (name = "studio", description = "Service status"),
        (name = "classes", description = "Class scheduling and lifecycle"),
        (name = "bookings", description = "Client bookings")
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_booking_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/bookings"));
        assert!(doc.paths.paths.contains_key("/classes/{id}"));
    }
}

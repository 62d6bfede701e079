pub mod assistant;
pub mod confirmation;
pub mod google_calendar;

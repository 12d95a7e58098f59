pub mod course;
pub mod offering;
pub mod sync_run;

pub use course::{Course, CourseFields, DESCRIPTION_FORMAT};
pub use offering::{Offering, OfferingFields, OfferingKey, OfferingRef, PRICE_PLACEHOLDER};
pub use sync_run::{SyncOverview, SyncRun};

pub mod dedupe;
pub mod identity;
pub mod notify;
pub mod orphans;
pub mod report;
pub mod roster;
pub mod scheduler;
pub mod sync_service;
pub mod transform;

pub use identity::{CourseIndex, derive_candidate_course_ids};
pub use notify::{LogNotifier, Notifier};
pub use orphans::repair_orphans;
pub use report::{OrphanReport, RunReport, RunStatus};
pub use roster::Roster;
pub use scheduler::SyncScheduler;
pub use sync_service::{SyncOptions, SyncService};

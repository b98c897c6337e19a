pub mod conflict;
pub mod lifecycle;
pub mod repository;
pub mod slots;

pub use conflict::{find_conflicts, intervals_overlap, ConflictDetectionService};
pub use lifecycle::AppointmentLifecycleService;
pub use repository::{AppointmentRepository, InMemoryAppointmentRepository, SupabaseAppointmentRepository};
pub use slots::{build_slots, SlotService};

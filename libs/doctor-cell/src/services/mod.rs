pub mod availability;
pub mod doctor;
pub mod repository;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use repository::{
    AvailabilityRepository, DoctorRepository, InMemoryAvailabilityRepository, InMemoryDoctorRepository,
    SupabaseAvailabilityRepository, SupabaseDoctorRepository,
};

pub mod patient;
pub mod repository;

pub use patient::*;
pub use repository::*;

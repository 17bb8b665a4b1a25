pub mod scheduling;
pub mod staffing;

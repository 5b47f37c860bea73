pub mod reports;
pub mod sync;

//! Fixtures for exercising the sandbox itself
//!
//! - [`TempDatabase`] - file-backed SQLite database removed on drop
//! - [`ManualClock`] - live clock stand-in that only moves when told to

pub mod clock;
pub mod database;

pub use clock::ManualClock;
pub use database::TempDatabase;

//! Demonstration host application and fixtures for end-to-end sandbox tests
//!
//! [`blog`] is written only against [`HostServices`](sandbox_lib::HostServices),
//! so the same code runs on live services or inside a sandbox.

pub mod blog;
pub mod fixtures;

pub use blog::{Blog, FeedItem, Post};
pub use fixtures::{file_sandbox, live_functions, memory_sandbox, sqlite_sandbox, test_config};

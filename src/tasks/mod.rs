//! Background Tasks Module
//!
//! Contains work that runs detached from request handling.
//!
//! # Tasks
//! - TTL Cleanup: periodically drops expired entries from backends that
//!   do not expire keys on their own
//! - Lazy Delete: removes keys found expired during a read without making
//!   the reader wait

mod cleanup;
mod lazy_delete;

pub use cleanup::spawn_cleanup_task;
pub use lazy_delete::spawn_lazy_delete;

//! # Resume Cache
//!
//! Remembers finished downloads so that a repeated request can be answered
//! from disk instead of downloading the same content again.

pub mod providers;
mod types;

pub use providers::{FileResumeCache, ResumeCache};
pub use types::{CacheRecord, fingerprint};

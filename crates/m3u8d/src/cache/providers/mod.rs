//! # Resume Cache Providers

pub use self::file::FileResumeCache;
pub use self::provider::ResumeCache;

pub mod provider;

pub mod file;

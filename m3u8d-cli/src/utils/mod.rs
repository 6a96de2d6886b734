mod headers;
pub mod progress;

// Export utility functions
pub use self::headers::parse_headers;

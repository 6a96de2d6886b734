// HLS pipeline: playlist resolution and parsing, segment codec and the download scheduler

pub mod decryption;
pub mod playlist;
pub mod resolver;
pub mod scheduler;
pub mod segment_utils;

// Re-exports for easier access
pub use decryption::decrypt;
pub use playlist::{
    SegmentRef, apply_skip, extract_key_url, extract_segments, fetch_key, playlist_host,
};
pub use resolver::{ResolvedPlaylist, resolve_playlist};
pub use scheduler::SegmentScheduler;
pub use segment_utils::{TS_SYNC_BYTE, realign_sync_byte};

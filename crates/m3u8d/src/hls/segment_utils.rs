use bytes::Bytes;

/// First byte of every MPEG-TS packet.
pub const TS_SYNC_BYTE: u8 = 0x47;

/// Drop everything before the first sync byte.
///
/// Some servers prepend junk (e.g. an ID3 tag) to each segment, which
/// breaks playback once segments are concatenated. A buffer without any sync
/// byte is returned unchanged.
pub fn realign_sync_byte(data: Bytes) -> Bytes {
    match memchr::memchr(TS_SYNC_BYTE, &data) {
        Some(0) | None => data,
        Some(offset) => data.slice(offset..),
    }
}

/// Whether a playlist line references another playlist.
pub fn is_playlist_uri(line: &str) -> bool {
    line.to_ascii_lowercase().ends_with(".m3u8")
}

/// Whether a playlist line references a transport-stream segment.
pub fn is_segment_uri(line: &str) -> bool {
    line.to_ascii_lowercase().ends_with(".ts")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realign_without_sync_byte_is_identity() {
        let data = Bytes::from_static(&[0x00, 0x01, 0x02, 0x46, 0x48]);
        assert_eq!(realign_sync_byte(data.clone()), data);
        assert!(realign_sync_byte(Bytes::new()).is_empty());
    }

    #[test]
    fn test_realign_drops_leading_junk() {
        let mut raw = vec![0x89, 0x50, 0x4E, 0x00, 0x00];
        let k = raw.len();
        raw.extend_from_slice(&[TS_SYNC_BYTE, 0x40, 0x11, 0x10, TS_SYNC_BYTE]);
        let data = Bytes::from(raw.clone());

        let aligned = realign_sync_byte(data);
        assert_eq!(aligned.len(), raw.len() - k);
        assert_eq!(&aligned[..], &raw[k..]);
    }

    #[test]
    fn test_realign_cuts_at_sync_byte_inside_junk() {
        // "\x89PNG" carries 0x47 as its fourth byte
        let data = Bytes::from_static(b"\x89PNG\r\n\x1a\n");
        assert_eq!(&realign_sync_byte(data)[..], b"G\r\n\x1a\n");
    }

    #[test]
    fn test_realign_keeps_already_aligned_buffer() {
        let data = Bytes::from_static(&[TS_SYNC_BYTE, 0x00, TS_SYNC_BYTE]);
        assert_eq!(realign_sync_byte(data.clone()), data);
    }

    #[test]
    fn test_extension_checks_are_case_insensitive() {
        assert!(is_playlist_uri("https://a/b/INDEX.M3U8"));
        assert!(is_segment_uri("seg-001.TS"));
        assert!(!is_segment_uri("seg-001.ts?token=1"));
        assert!(!is_playlist_uri("#EXTM3U"));
    }
}

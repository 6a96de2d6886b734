// HLS Playlist parsing: host derivation, key discovery and the flat segment list.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, info};
use url::Url;

use crate::HostMode;
use crate::error::{M3u8Error, Result};
use crate::fetcher::ResourceFetcher;

const KEY_TAG: &str = "#EXT-X-KEY";

/// One media segment to download, named after its position in the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// Zero-padded file name, `00001.ts` for the first segment
    pub name: String,
    /// Absolute fetch URL
    pub url: String,
}

impl SegmentRef {
    pub fn file_name(index: usize) -> String {
        format!("{index:05}.ts")
    }
}

/// Prefix joined with relative segment and key URIs.
///
/// [`HostMode::Apiv1`] yields `scheme://host[:port]` plus the directory of the
/// playlist path, [`HostMode::Apiv2`] only `scheme://host[:port]`.
pub fn playlist_host(playlist_url: &str, mode: HostMode) -> Result<String> {
    let url = Url::parse(playlist_url).map_err(|e| {
        M3u8Error::Config(format!("Invalid playlist URL {playlist_url}: {e}"))
    })?;
    let host = url
        .host_str()
        .ok_or_else(|| M3u8Error::Config(format!("Playlist URL {playlist_url} has no host")))?;

    let origin = match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    };

    match mode {
        HostMode::Apiv2 => Ok(origin),
        HostMode::Apiv1 => {
            let path = url.path();
            let dir = match path.rfind('/') {
                Some(idx) => &path[..idx],
                None => "",
            };
            Ok(format!("{origin}{dir}"))
        }
    }
}

/// Split an attribute list (`METHOD=AES-128,URI="k.key"`) on commas outside quotes.
fn parse_attribute_list(rest: &str) -> HashMap<String, String> {
    let mut parts: Vec<&str> = Vec::new();
    let mut in_quotes = false;
    let mut start = 0usize;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(rest[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < rest.len() {
        parts.push(rest[start..].trim());
    }

    parts
        .into_iter()
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            let mut val = v.trim();
            if let Some(stripped) = val.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                val = stripped;
            }
            Some((k.trim().to_ascii_uppercase(), val.to_string()))
        })
        .collect()
}

fn is_absolute(uri: &str) -> bool {
    let lower = uri.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// URL of the decryption key declared by the playlist, if any.
///
/// Key tags with `METHOD=NONE` are ignored. Relative URIs are appended to `host`.
pub fn extract_key_url(host: &str, body: &str) -> Result<Option<String>> {
    for line in body.lines().filter(|line| line.contains(KEY_TAG)) {
        let rest = line
            .split_once(':')
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let attributes = parse_attribute_list(rest);

        if attributes
            .get("METHOD")
            .is_some_and(|method| method.eq_ignore_ascii_case("NONE"))
        {
            continue;
        }

        let uri = attributes
            .get("URI")
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| {
                M3u8Error::Resolution(format!("key tag without URI: {}", line.trim()))
            })?;

        let key_url = if is_absolute(uri) {
            uri.clone()
        } else {
            format!("{host}/{uri}")
        };
        return Ok(Some(key_url));
    }
    Ok(None)
}

/// Fetch the decryption key declared by the playlist.
///
/// `None` means the content is not encrypted.
pub async fn fetch_key(
    fetcher: &dyn ResourceFetcher,
    host: &str,
    body: &str,
) -> Result<Option<Bytes>> {
    let Some(key_url) = extract_key_url(host, body)? else {
        debug!("Playlist declares no decryption key");
        return Ok(None);
    };

    let key = fetcher.fetch(&key_url).await?;
    info!(key_url = %key_url, len = key.len(), "Fetched decryption key");
    Ok(Some(key))
}

/// Every non-empty, non-comment line of the playlist, in order.
pub fn extract_segments(host: &str, body: &str) -> Vec<SegmentRef> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(idx, line)| {
            let url = if is_absolute(line) {
                line.to_string()
            } else {
                format!("{host}/{line}").replace('\\', "/")
            };
            SegmentRef {
                name: SegmentRef::file_name(idx + 1),
                url,
            }
        })
        .collect()
}

/// Drop the first `skip` segments; an empty remainder is an error.
pub fn apply_skip(mut segments: Vec<SegmentRef>, skip: usize) -> Result<Vec<SegmentRef>> {
    if segments.len() <= skip {
        return Err(M3u8Error::EmptyResult(format!(
            "playlist has {} segments, {skip} skipped",
            segments.len()
        )));
    }
    segments.drain(..skip);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    const ENCRYPTED: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:10\n\
        #EXT-X-KEY:METHOD=AES-128,URI=\"enc.key\",IV=0x00000000000000000000000000000000\n\
        #EXTINF:10.0,\n\
        seg0.ts\n\
        #EXTINF:10.0,\n\
        seg1.ts\n\
        #EXT-X-ENDLIST\n";

    #[test]
    fn test_playlist_host_modes() {
        let url = "https://cdn.example.com:8443/vod/movie/index.m3u8?t=1";
        assert_eq!(
            playlist_host(url, HostMode::Apiv1).unwrap(),
            "https://cdn.example.com:8443/vod/movie"
        );
        assert_eq!(
            playlist_host(url, HostMode::Apiv2).unwrap(),
            "https://cdn.example.com:8443"
        );
        assert_eq!(
            playlist_host("http://a.com/index.m3u8", HostMode::Apiv1).unwrap(),
            "http://a.com"
        );
        assert!(playlist_host("not a url", HostMode::Apiv1).is_err());
    }

    #[test]
    fn test_extract_key_url_relative_and_absolute() {
        let host = "https://cdn.example.com/vod";
        assert_eq!(
            extract_key_url(host, ENCRYPTED).unwrap().as_deref(),
            Some("https://cdn.example.com/vod/enc.key")
        );

        let absolute = ENCRYPTED.replace("enc.key", "https://keys.example.com/k?id=1,2");
        assert_eq!(
            extract_key_url(host, &absolute).unwrap().as_deref(),
            Some("https://keys.example.com/k?id=1,2")
        );
    }

    #[test]
    fn test_extract_key_url_absent_or_none() {
        assert_eq!(extract_key_url("http://h", "#EXTM3U\na.ts\n").unwrap(), None);
        assert_eq!(
            extract_key_url("http://h", "#EXTM3U\n#EXT-X-KEY:METHOD=NONE\na.ts\n").unwrap(),
            None
        );
        assert!(matches!(
            extract_key_url("http://h", "#EXT-X-KEY:METHOD=AES-128\na.ts\n"),
            Err(M3u8Error::Resolution(_))
        ));
    }

    #[test]
    fn test_extract_segments_names_and_urls() {
        let body = "#EXTM3U\r\n#EXTINF:4,\r\n\r\npart\\a.ts\r\n#EXTINF:4,\r\nhttps://other.example/b.ts\r\nc.ts\r\n";
        let segments = extract_segments("http://h/dir", body);

        assert_eq!(
            segments,
            vec![
                SegmentRef {
                    name: "00001.ts".into(),
                    url: "http://h/dir/part/a.ts".into()
                },
                SegmentRef {
                    name: "00002.ts".into(),
                    url: "https://other.example/b.ts".into()
                },
                SegmentRef {
                    name: "00003.ts".into(),
                    url: "http://h/dir/c.ts".into()
                },
            ]
        );
    }

    #[test]
    fn test_extract_segments_counts_every_content_line() {
        let lines: Vec<String> = (0..123).map(|i| format!("chunk-{i}.ts")).collect();
        let body = format!("#EXTM3U\n{}\n#EXT-X-ENDLIST\n", lines.join("\n#EXTINF:2,\n"));
        let segments = extract_segments("http://h", &body);

        assert_eq!(segments.len(), 123);
        for (idx, segment) in segments.iter().enumerate() {
            assert_eq!(segment.name, format!("{:05}.ts", idx + 1));
            assert_eq!(segment.url, format!("http://h/chunk-{idx}.ts"));
        }
    }

    #[test]
    fn test_apply_skip() {
        let segments = extract_segments("http://h", "a.ts\nb.ts\nc.ts\n");

        let rest = apply_skip(segments.clone(), 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].name, "00003.ts");

        assert_eq!(apply_skip(segments.clone(), 0).unwrap(), segments);
        assert!(matches!(
            apply_skip(segments, 3),
            Err(M3u8Error::EmptyResult(_))
        ));
    }

    struct KeyServer;

    #[async_trait]
    impl ResourceFetcher for KeyServer {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            assert_eq!(url, "https://cdn.example.com/vod/enc.key");
            Ok(Bytes::from_static(b"0123456789abcdef"))
        }
    }

    #[tokio::test]
    async fn test_fetch_key() {
        let key = fetch_key(&KeyServer, "https://cdn.example.com/vod", ENCRYPTED)
            .await
            .unwrap();
        assert_eq!(key.as_deref(), Some(&b"0123456789abcdef"[..]));

        let none = fetch_key(&KeyServer, "https://cdn.example.com/vod", "#EXTM3U\na.ts")
            .await
            .unwrap();
        assert!(none.is_none());
    }
}

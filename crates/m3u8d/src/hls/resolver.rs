// Playlist sniffing: follows nested manifests and landing pages down to a flat segment playlist.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::error::{M3u8Error, Result};
use crate::fetcher::ResourceFetcher;
use crate::hls::segment_utils::{is_playlist_uri, is_segment_uri};

static EMBEDDED_M3U8_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[a-zA-Z0-9/\\.%_-]+\.m3u8").expect("embedded m3u8 regex is valid")
});

/// A playlist that lists media segments directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPlaylist {
    pub url: String,
    pub body: String,
}

enum ManifestLine {
    Nested(String),
    Flat,
}

/// First line that is either a nested playlist or a segment, in document order.
fn scan_manifest(body: &str) -> Option<ManifestLine> {
    body.lines().map(str::trim).find_map(|line| {
        if is_playlist_uri(line) {
            Some(ManifestLine::Nested(line.to_string()))
        } else if is_segment_uri(line) {
            Some(ManifestLine::Flat)
        } else {
            None
        }
    })
}

/// The whole URL or its path ends in `.m3u8`, so both `get?file=a.m3u8`
/// and `a.m3u8?token=…` count.
fn points_at_playlist(url: &str) -> bool {
    is_playlist_uri(url) || Url::parse(url).is_ok_and(|parsed| is_playlist_uri(parsed.path()))
}

/// Resolve `start_url` to the flat playlist that lists segments.
///
/// A URL (or URL path) ending in `.m3u8` is fetched and scanned: a nested `.m3u8`
/// line is followed (relative to the current URL), a `.ts` line ends the
/// search. Any other URL is treated as a page and searched for an embedded
/// absolute `.m3u8` link. At most `max_hops` documents are fetched.
pub async fn resolve_playlist(
    fetcher: &dyn ResourceFetcher,
    start_url: &str,
    max_hops: usize,
) -> Result<ResolvedPlaylist> {
    let mut current = start_url.to_string();

    for hop in 0..max_hops {
        let content = fetcher.fetch(&current).await?;
        let body = String::from_utf8_lossy(&content).into_owned();
        debug!(url = %current, hop, len = body.len(), "Sniffing document");

        if points_at_playlist(&current) {
            match scan_manifest(&body) {
                Some(ManifestLine::Flat) => {
                    info!(url = %current, "Found media playlist");
                    return Ok(ResolvedPlaylist { url: current, body });
                }
                Some(ManifestLine::Nested(line)) => {
                    let base = Url::parse(&current).map_err(|e| {
                        M3u8Error::Resolution(format!("invalid playlist URL {current}: {e}"))
                    })?;
                    let next = base.join(&line).map_err(|e| {
                        M3u8Error::Resolution(format!(
                            "could not join {current} with nested playlist {line}: {e}"
                        ))
                    })?;
                    debug!(from = %current, to = %next, "Following nested playlist");
                    current = next.into();
                }
                None => {
                    return Err(M3u8Error::Resolution(format!(
                        "{current} lists neither segments nor playlists"
                    )));
                }
            }
            continue;
        }

        let Some(found) = EMBEDDED_M3U8_REGEX.find(&body) else {
            return Err(M3u8Error::Resolution(format!(
                "no m3u8 link found in page {current}"
            )));
        };
        debug!(page = %current, found = found.as_str(), "Found embedded playlist link");
        current = found.as_str().to_string();
    }

    Err(M3u8Error::Resolution(format!(
        "too many redirects while resolving {start_url} (limit {max_hops})"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapFetcher {
        documents: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.documents.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl ResourceFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes> {
            self.requests.lock().push(url.to_string());
            self.documents
                .get(url)
                .map(|body| Bytes::from(body.clone()))
                .ok_or_else(|| M3u8Error::Resolution(format!("unexpected fetch {url}")))
        }
    }

    const FLAT: &str = "#EXTM3U\n#EXTINF:10,\n0.ts\n#EXTINF:10,\n1.ts\n#EXT-X-ENDLIST\n";

    #[tokio::test]
    async fn test_flat_playlist_is_returned_unchanged() {
        let fetcher = MapFetcher::default().with("https://a.example/v/index.m3u8", FLAT);

        let resolved = resolve_playlist(&fetcher, "https://a.example/v/index.m3u8", 5)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://a.example/v/index.m3u8");
        assert_eq!(resolved.body, FLAT);
    }

    #[tokio::test]
    async fn test_playlist_named_in_query_or_path() {
        let fetcher = MapFetcher::default()
            .with("https://a.example/get?file=index.m3u8", FLAT)
            .with("https://a.example/v/index.m3u8?token=abc", FLAT);

        let resolved = resolve_playlist(&fetcher, "https://a.example/get?file=index.m3u8", 5)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://a.example/get?file=index.m3u8");
        assert_eq!(resolved.body, FLAT);

        let resolved = resolve_playlist(&fetcher, "https://a.example/v/index.m3u8?token=abc", 5)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://a.example/v/index.m3u8?token=abc");
    }

    #[tokio::test]
    async fn test_nested_playlist_resolves_relative_to_parent() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nhd/index.m3u8\n";
        let fetcher = MapFetcher::default()
            .with("https://a.example/v/master.m3u8", master)
            .with("https://a.example/v/hd/index.m3u8", FLAT);

        let resolved = resolve_playlist(&fetcher, "https://a.example/v/master.m3u8", 5)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://a.example/v/hd/index.m3u8");
        assert_eq!(resolved.body, FLAT);
    }

    #[tokio::test]
    async fn test_first_match_wins() {
        // The nested reference precedes the segment, so it is followed
        let mixed = "#EXTM3U\nother/index.m3u8\n0.ts\n";
        let fetcher = MapFetcher::default()
            .with("https://a.example/mixed.m3u8", mixed)
            .with("https://a.example/other/index.m3u8", FLAT);

        let resolved = resolve_playlist(&fetcher, "https://a.example/mixed.m3u8", 5)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://a.example/other/index.m3u8");
    }

    #[tokio::test]
    async fn test_cycle_fails_after_hop_bound() {
        let fetcher = MapFetcher::default()
            .with("https://a.example/a.m3u8", "#EXTM3U\nb.m3u8\n")
            .with("https://a.example/b.m3u8", "#EXTM3U\na.m3u8\n");

        let err = resolve_playlist(&fetcher, "https://a.example/a.m3u8", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, M3u8Error::Resolution(_)));
        assert_eq!(fetcher.requests.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_landing_page_with_embedded_link() {
        let page = r#"<html><script>var src = "https://cdn.example.com/hls/ep1/index.m3u8";</script></html>"#;
        let fetcher = MapFetcher::default()
            .with("https://site.example/watch/1", page)
            .with("https://cdn.example.com/hls/ep1/index.m3u8", FLAT);

        let resolved = resolve_playlist(&fetcher, "https://site.example/watch/1", 5)
            .await
            .unwrap();
        assert_eq!(resolved.url, "https://cdn.example.com/hls/ep1/index.m3u8");
    }

    #[tokio::test]
    async fn test_page_without_link_and_empty_manifest_fail() {
        let fetcher = MapFetcher::default()
            .with("https://site.example/watch/2", "<html>nothing here</html>")
            .with("https://a.example/empty.m3u8", "#EXTM3U\n#EXT-X-ENDLIST\n");

        assert!(matches!(
            resolve_playlist(&fetcher, "https://site.example/watch/2", 5).await,
            Err(M3u8Error::Resolution(_))
        ));
        assert!(matches!(
            resolve_playlist(&fetcher, "https://a.example/empty.m3u8", 5).await,
            Err(M3u8Error::Resolution(_))
        ));
    }
}

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::error::{M3u8Error, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_13_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/79.0.3945.88 Safari/537.36";

/// Tunables for a download session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Number of segments downloaded in parallel
    pub download_concurrency: usize,

    /// Attempts per segment before the segment is considered failed
    pub max_segment_attempts: u32,

    /// Back-off unit; attempt `n` waits `n * retry_delay_unit` before starting
    pub retry_delay_unit: Duration,

    /// Maximum number of playlist indirections followed while sniffing
    pub max_resolve_hops: usize,

    /// Maximum numeric suffix tried when picking the output file name
    pub max_name_probes: usize,

    /// Overall timeout for a single HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 8,
            max_segment_attempts: 5,
            retry_delay_unit: Duration::from_secs(1),
            max_resolve_hops: 5,
            max_name_probes: 10_000,
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl SessionConfig {
    pub fn builder() -> crate::builder::SessionConfigBuilder {
        crate::builder::SessionConfigBuilder::new()
    }

    /// Headers sent with every request of a session.
    ///
    /// `referer` is derived from the source URL. Entries in `overrides` replace
    /// the default header of the same (case-insensitive) name; each value in
    /// the list is sent as a separate header line.
    pub fn build_headers(
        &self,
        referer: &str,
        overrides: &BTreeMap<String, Vec<String>>,
    ) -> Result<HeaderMap> {
        let mut headers = Self::get_default_headers();

        headers.insert(header::USER_AGENT, parse_value(&self.user_agent)?);
        headers.insert(header::REFERER, parse_value(referer)?);

        for (name, values) in overrides {
            let name = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| M3u8Error::Config(format!("invalid header name '{name}': {e}")))?;
            headers.remove(&name);
            for value in values {
                headers.append(name.clone(), parse_value(value)?);
            }
        }

        Ok(headers)
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

        default_headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9, en;q=0.8, de;q=0.7, *;q=0.5"),
        );
        default_headers
    }
}

fn parse_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value.trim())
        .map_err(|e| M3u8Error::Config(format!("invalid header value '{value}': {e}")))
}

use reqwest::Proxy;

use crate::error::{M3u8Error, Result};

/// Proxy configuration types
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    /// HTTP proxy
    Http,
    /// HTTPS proxy
    Https,
    /// SOCKS5 proxy, names resolved locally
    Socks5,
    /// SOCKS5 proxy, names resolved by the proxy
    Socks5h,
}

/// Proxy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080")
    pub url: String,
    /// Type of proxy, taken from the URL scheme
    pub proxy_type: ProxyType,
}

impl ProxyConfig {
    /// Parse a scheme-prefixed proxy spec such as `SOCKS5://127.0.0.1:1080`.
    ///
    /// The spec is lower-cased first. An empty spec means a direct connection.
    pub fn parse(spec: &str) -> Result<Option<Self>> {
        let url = spec.trim().to_lowercase();
        if url.is_empty() {
            return Ok(None);
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(M3u8Error::Config(format!(
                "proxy '{spec}' is missing a scheme (expected e.g. socks5:// or http://)"
            )));
        };
        if rest.is_empty() {
            return Err(M3u8Error::Config(format!("proxy '{spec}' has no address")));
        }

        let proxy_type = match scheme {
            "http" => ProxyType::Http,
            "https" => ProxyType::Https,
            "socks5" => ProxyType::Socks5,
            "socks5h" => ProxyType::Socks5h,
            other => {
                return Err(M3u8Error::Config(format!(
                    "unsupported proxy scheme '{other}'"
                )));
            }
        };

        Ok(Some(Self { url, proxy_type }))
    }
}

/// Build a reqwest Proxy object from our proxy configuration
pub fn build_proxy_from_config(config: &ProxyConfig) -> Result<Proxy> {
    // Every request of a session goes through the proxy, whatever the target scheme
    Proxy::all(&config.url).map_err(|e| {
        M3u8Error::Config(format!(
            "invalid {:?} proxy URL '{}': {e}",
            config.proxy_type, config.url
        ))
    })
}

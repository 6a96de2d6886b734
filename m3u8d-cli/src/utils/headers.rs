use std::collections::BTreeMap;

use tracing::{info, warn};

/// Parse a header string in format "Name: Value"
fn parse_header(header_str: &str) -> Option<(&str, &str)> {
    let Some((name, value)) = header_str.split_once(':') else {
        warn!(
            "Invalid header format: '{}'. Expected 'Name: Value'",
            header_str
        );
        return None;
    };

    let name = name.trim();
    if name.is_empty() {
        warn!("Invalid header name in '{}'", header_str);
        return None;
    }
    Some((name, value.trim()))
}

/// Parse a collection of header strings; repeated names keep every value in order.
pub fn parse_headers(header_strings: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for header_str in header_strings {
        if let Some((name, value)) = parse_header(header_str) {
            info!("Adding header: {}: {}", name, value);
            headers
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Cookie: a=1".to_string(),
            "Referer:https://site.example.com/x".to_string(),
            "Cookie: b=2".to_string(),
            "garbage".to_string(),
            ": empty".to_string(),
        ]);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers["Cookie"], vec!["a=1", "b=2"]);
        assert_eq!(headers["Referer"], vec!["https://site.example.com/x"]);
    }
}

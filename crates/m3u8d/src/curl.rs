//! # curl import/export
//!
//! Converts a browser's "Copy as cURL" command line into a [`DownloadRequest`]
//! and renders a request back into a curl command.

use url::Url;

use crate::DownloadRequest;
use crate::error::{M3u8Error, Result};

/// Split a shell command line into words, honouring quotes and escapes.
fn split_words(input: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => {
                            return Err(M3u8Error::Config(
                                "unterminated single quote in curl command".to_string(),
                            ));
                        }
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\' | '$' | '`')) => current.push(c),
                            Some('\n') => {}
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => break,
                        },
                        Some(c) => current.push(c),
                        None => {
                            return Err(M3u8Error::Config(
                                "unterminated double quote in curl command".to_string(),
                            ));
                        }
                    }
                }
            }
            '\\' => match chars.next() {
                // line continuation
                Some('\n') => {}
                Some('\r') if chars.peek() == Some(&'\n') => {
                    chars.next();
                }
                Some(c) => {
                    in_word = true;
                    current.push(c);
                }
                None => {}
            },
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                current.push(c);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn add_header(request: &mut DownloadRequest, raw: &str) -> Result<()> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| M3u8Error::Config(format!("malformed header '{raw}'")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(M3u8Error::Config(format!("malformed header '{raw}'")));
    }
    request
        .headers
        .entry(name.to_string())
        .or_default()
        .push(value.trim().to_string());
    Ok(())
}

/// Parse `curl 'URL' -H 'Name: Value' …` into a request.
///
/// Understands `-H/--header`, `-A/--user-agent`, `-e/--referer`,
/// `-b/--cookie`, `-k/--insecure`, `-x/--proxy` and `--url`. Other options
/// are ignored; options known to take a value have it skipped as well, and
/// the first positional word that parses as a URL is taken as the target.
pub fn parse_curl(input: &str) -> Result<DownloadRequest> {
    let words = split_words(input)?;
    let mut words = words.into_iter();

    match words.next() {
        Some(program) if program == "curl" || program.ends_with("/curl") => {}
        _ => {
            return Err(M3u8Error::Config(
                "not a curl command line".to_string(),
            ));
        }
    }

    let mut request = DownloadRequest::default();
    while let Some(word) = words.next() {
        let mut value_of = |flag: &str| {
            words
                .next()
                .ok_or_else(|| M3u8Error::Config(format!("option {flag} is missing its value")))
        };

        match word.as_str() {
            "-H" | "--header" => {
                let raw = value_of(&word)?;
                add_header(&mut request, &raw)?;
            }
            "-A" | "--user-agent" => {
                let value = value_of(&word)?;
                add_header(&mut request, &format!("User-Agent: {value}"))?;
            }
            "-e" | "--referer" => {
                let value = value_of(&word)?;
                add_header(&mut request, &format!("Referer: {value}"))?;
            }
            "-b" | "--cookie" => {
                let value = value_of(&word)?;
                add_header(&mut request, &format!("Cookie: {value}"))?;
            }
            "-k" | "--insecure" => request.insecure = true,
            "-x" | "--proxy" => request.proxy = value_of(&word)?,
            "--url" => request.m3u8_url = value_of(&word)?,
            "-X" | "--request" | "-d" | "--data" | "--data-raw" | "--data-binary"
            | "-u" | "--user" | "-o" | "--output" | "-m" | "--max-time"
            | "--connect-timeout" | "--retry" | "--retry-delay" | "--retry-max-time"
            | "-r" | "--range" | "-w" | "--write-out" | "--limit-rate" => {
                value_of(&word)?;
            }
            flag if flag.starts_with('-') => {}
            // Values of unrecognised options are not URLs
            url if request.m3u8_url.is_empty() && Url::parse(url).is_ok() => {
                request.m3u8_url = url.to_string();
            }
            _ => {}
        }
    }

    if request.m3u8_url.is_empty() {
        return Err(M3u8Error::Config(
            "curl command line has no URL".to_string(),
        ));
    }
    Ok(request)
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Render `request` as a curl command line that [`parse_curl`] reads back.
pub fn to_curl(request: &DownloadRequest) -> String {
    let mut parts = vec![format!("curl {}", quote(&request.m3u8_url))];
    for (name, values) in &request.headers {
        for value in values {
            parts.push(format!("-H {}", quote(&format!("{name}: {value}"))));
        }
    }
    if request.insecure {
        parts.push("--insecure".to_string());
    }
    if !request.proxy.is_empty() {
        parts.push(format!("--proxy {}", quote(&request.proxy)));
    }
    parts.join(" \\\n  ")
}

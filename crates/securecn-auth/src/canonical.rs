//! Canonical request construction for Escher signing.
//!
//! The canonical request is the byte-exact input to the signature. Client and
//! server derive it independently, so every builder here is a pure function of
//! its inputs:
//!
//! ```text
//! HTTPRequestMethod\n
//! CanonicalPath\n
//! CanonicalQueryString\n
//! CanonicalHeaders\n\n
//! SignedHeaders\n
//! HexEncode(SHA256(Body))
//! ```
//!
//! Section count is fixed: an absent query string still produces an empty line.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use sha2::{Digest, Sha256};

/// Characters percent-encoded in canonical query keys and values.
///
/// Everything except RFC 3986 unreserved characters
/// (A-Z, a-z, 0-9, `-`, `_`, `.`, `~`).
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Hex SHA-256 of the empty body.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Build the full canonical request string from its components.
///
/// `headers` may contain any number of entries, in any order and letter case;
/// only names listed in `signed_headers` (lower-case) are included.
///
/// # Examples
///
/// ```
/// use securecn_auth::canonical::{EMPTY_PAYLOAD_HASH, build_canonical_request};
///
/// let canonical = build_canonical_request(
///     "get",
///     "/api/kubernetesClusters",
///     "",
///     &[("Host", "securecn.cisco.com"), ("X-Escher-Date", "20240101T000000Z")],
///     &["host", "x-escher-date"],
///     EMPTY_PAYLOAD_HASH,
/// );
/// assert!(canonical.starts_with("GET\n/api/kubernetesClusters\n\nhost:securecn.cisco.com\n"));
/// ```
#[must_use]
pub fn build_canonical_request(
    method: &str,
    path: &str,
    query_string: &str,
    headers: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> String {
    let method = method.to_ascii_uppercase();
    let canonical_path = build_canonical_path(path);
    let canonical_query = build_canonical_query_string(query_string);
    let canonical_headers = build_canonical_headers(headers, signed_headers);
    let signed_headers_str = build_signed_headers_string(signed_headers);

    format!(
        "{method}\n{canonical_path}\n{canonical_query}\n{canonical_headers}\n\n{signed_headers_str}\n{payload_hash}"
    )
}

/// Build the canonical path.
///
/// The path keeps its on-the-wire encoding; only `.` and `..` segments are
/// resolved. Empty paths are normalized to `/`.
///
/// # Examples
///
/// ```
/// use securecn_auth::canonical::build_canonical_path;
///
/// assert_eq!(build_canonical_path(""), "/");
/// assert_eq!(build_canonical_path("/a/./b/../c"), "/a/c");
/// assert_eq!(build_canonical_path("/hello%20world"), "/hello%20world");
/// ```
#[must_use]
pub fn build_canonical_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_owned();
    }

    let mut segments: Vec<&str> = Vec::new();
    let mut ends_in_directory = false;
    for segment in path.split('/') {
        ends_in_directory = false;
        match segment {
            "." => ends_in_directory = true,
            ".." => {
                // The leading empty segment anchors the root.
                if segments.len() > 1 {
                    segments.pop();
                }
                ends_in_directory = true;
            }
            other => segments.push(other),
        }
    }

    let mut canonical = segments.join("/");
    if ends_in_directory {
        canonical.push('/');
    }
    if !canonical.starts_with('/') {
        canonical.insert(0, '/');
    }
    canonical
}

/// Build the canonical query string.
///
/// Each key and value is percent-decoded and re-encoded with the unreserved
/// set, so `a b` and `a%20b` both canonicalize to `a%20b`. Decoding works on
/// raw bytes, so escapes that are not valid UTF-8 stay distinct. Parameters
/// are sorted by key, then by value for duplicate keys. A parameter without
/// `=` gets an empty value.
///
/// # Examples
///
/// ```
/// use securecn_auth::canonical::build_canonical_query_string;
///
/// assert_eq!(build_canonical_query_string(""), "");
/// assert_eq!(build_canonical_query_string("b=2&a=1"), "a=1&b=2");
/// ```
#[must_use]
pub fn build_canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    let mut params: Vec<(String, String)> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|param| {
            let (key, value) = param.split_once('=').unwrap_or((param, ""));
            (normalize_query_component(key), normalize_query_component(value))
        })
        .collect();

    params.sort_unstable();

    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the canonical headers string from the request headers.
///
/// Only headers listed in `signed_headers` are included. Header names are
/// lower-cased, values are trimmed and runs of whitespace collapse to a single
/// space. Repeated headers are joined with `,` in the order they appear.
///
/// The result does NOT include a trailing newline; the caller adds that as part
/// of the canonical request format.
#[must_use]
pub fn build_canonical_headers(headers: &[(&str, &str)], signed_headers: &[&str]) -> String {
    let mut header_map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let lower_name = name.to_ascii_lowercase();
        let trimmed_value = collapse_whitespace(value.trim());
        header_map
            .entry(lower_name)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&trimmed_value);
            })
            .or_insert(trimmed_value);
    }

    let mut sorted_signed: Vec<&str> = signed_headers.to_vec();
    sorted_signed.sort_unstable();
    sorted_signed.dedup();

    sorted_signed
        .iter()
        .filter_map(|name| header_map.get(*name).map(|value| format!("{name}:{value}")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the signed headers string: sorted, deduplicated, `;`-separated.
///
/// # Examples
///
/// ```
/// use securecn_auth::canonical::build_signed_headers_string;
///
/// assert_eq!(
///     build_signed_headers_string(&["x-escher-date", "host"]),
///     "host;x-escher-date"
/// );
/// ```
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut sorted: Vec<&str> = signed_headers.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(";")
}

/// Hex SHA-256 of a request body. An empty body hashes to [`EMPTY_PAYLOAD_HASH`].
///
/// # Examples
///
/// ```
/// use securecn_auth::canonical::{EMPTY_PAYLOAD_HASH, hash_payload};
///
/// assert_eq!(hash_payload(b""), EMPTY_PAYLOAD_HASH);
/// ```
#[must_use]
pub fn hash_payload(payload: &[u8]) -> String {
    if payload.is_empty() {
        return EMPTY_PAYLOAD_HASH.to_owned();
    }
    hex::encode(Sha256::digest(payload))
}

fn normalize_query_component(raw: &str) -> String {
    let decoded: Vec<u8> = percent_decode_str(raw).collect();
    percent_encode(&decoded, QUERY_ENCODE_SET).to_string()
}

/// Collapse consecutive whitespace characters in a string to a single space.
fn collapse_whitespace(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut prev_was_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !prev_was_space {
                result.push(' ');
                prev_was_space = true;
            }
        } else {
            result.push(ch);
            prev_was_space = false;
        }
    }
    result
}

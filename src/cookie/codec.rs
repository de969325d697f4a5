// Sessiongate: Cookie Codec
//
// Blob format, one cookie per line:
//
//   name=value; Domain=<domain>; Path=<path>
//
// Attribute names are case-insensitive on decode and unknown attributes are
// ignored. A line that cannot be split into name and value is skipped with a
// warning; one corrupted cookie must not lock the user out of the rest.

use super::{CodecError, Cookie, CookieSet};

/// Outcome of a lenient decode: what was recovered and what was dropped.
#[derive(Debug, Default)]
pub struct DecodeReport {
    pub cookies: CookieSet,
    pub skipped: Vec<CodecError>,
}

/// Serialize a cookie set into the stored blob.
pub fn encode(cookies: &CookieSet) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}; Domain={}; Path={}", c.name, c.value, c.domain, c.path))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode a blob, skipping malformed entries.
///
/// Fails only when the blob has entries and none of them decode. An empty
/// blob decodes to an empty set.
pub fn decode(blob: &str) -> Result<CookieSet, CodecError> {
    let report = decode_report(blob);
    if report.cookies.is_empty() && !report.skipped.is_empty() {
        return Err(CodecError::Undecodable {
            skipped: report.skipped.len(),
        });
    }
    Ok(report.cookies)
}

/// Decode a blob and report every entry that had to be dropped.
pub fn decode_report(blob: &str) -> DecodeReport {
    let mut report = DecodeReport::default();

    for (index, line) in blob.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match decode_entry(index, line) {
            Ok(cookie) => report.cookies.push(cookie),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed stored cookie");
                report.skipped.push(e);
            }
        }
    }

    report
}

fn decode_entry(index: usize, line: &str) -> Result<Cookie, CodecError> {
    let mut segments = line.split(';');
    let pair = segments.next().unwrap_or_default();

    let (name, value) = pair.split_once('=').ok_or_else(|| CodecError::Malformed {
        index,
        reason: "missing '=' between name and value".to_string(),
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CodecError::Malformed {
            index,
            reason: "empty cookie name".to_string(),
        });
    }

    let mut cookie = Cookie::new(name, value.trim(), "");
    for attr in segments {
        let Some((key, val)) = attr.trim().split_once('=') else {
            continue;
        };
        if key.eq_ignore_ascii_case("domain") {
            cookie.domain = val.trim().to_string();
        } else if key.eq_ignore_ascii_case("path") {
            cookie.path = val.trim().to_string();
        }
    }

    Ok(cookie)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

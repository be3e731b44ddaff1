//! Frontmatter metadata codec
//!
//! The header is the only durable on-disk contract:
//!
//! ```text
//! ---
//! key: value
//! ---
//!
//! <body>
//! ```
//!
//! Values are JSON scalar literals (numbers, booleans, quoted strings);
//! anything that does not parse is retained as a raw string. An
//! unterminated header is treated as "no metadata", not as an error, so a
//! hand-edited file can never be rejected by the decoder.

use crate::types::Metadata;

const DELIMITER: &str = "---";

/// Split a leading frontmatter header from the document body.
///
/// A header exists only when the first line is exactly `---` and a later
/// line is exactly `---`. Without a complete delimiter pair the metadata is
/// empty and the body is the entire input unchanged. One blank separator
/// line after the closing delimiter is consumed.
pub fn decode(raw: &str) -> (Metadata, String) {
    let mut lines = raw.split_inclusive('\n');

    let mut offset = match lines.next() {
        Some(first) if first.trim_end_matches(['\r', '\n']) == DELIMITER => first.len(),
        _ => return (Metadata::new(), raw.to_string()),
    };

    let mut metadata = Metadata::new();
    let mut terminated = false;

    for line in lines {
        offset += line.len();
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == DELIMITER {
            terminated = true;
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            metadata.insert(key.trim().to_string(), parse_value(value.trim()));
        }
    }

    if !terminated {
        // Unterminated header: by design not fatal
        return (Metadata::new(), raw.to_string());
    }

    let rest = &raw[offset..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    (metadata, body.to_string())
}

/// Serialize a metadata mapping and body into a framed document.
///
/// Entries are written in map-iteration order as `key: <json-literal>`,
/// wrapped in `---` delimiters and followed by a blank line and the body.
pub fn encode(metadata: &Metadata, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 64);
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in metadata {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&value.to_string());
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body);
    out
}

/// Parse a header value as a JSON scalar literal, falling back to the raw
/// string when the literal syntax does not apply.
fn parse_value(raw: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) if v.is_string() || v.is_number() || v.is_boolean() => v,
        _ => serde_json::Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_decode_no_header() {
        let (meta, body) = decode("# Title\n\nBody text\n");
        assert!(meta.is_empty());
        assert_eq!(body, "# Title\n\nBody text\n");
    }

    #[test]
    fn test_decode_typed_values() {
        let raw = "---\nremoteId: \"abc-123\"\ncount: 42\nenabled: true\nplain: hello world\n---\n\nBody\n";
        let (meta, body) = decode(raw);

        assert_eq!(meta["remoteId"], json!("abc-123"));
        assert_eq!(meta["count"], json!(42));
        assert_eq!(meta["enabled"], json!(true));
        assert_eq!(meta["plain"], json!("hello world"));
        assert_eq!(body, "Body\n");
    }

    #[test]
    fn test_decode_unterminated_header_is_no_metadata() {
        let raw = "---\nremoteId: \"abc\"\nno closing delimiter";
        let (meta, body) = decode(raw);

        assert!(meta.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_decode_empty_header() {
        let (meta, body) = decode("---\n---\n\nbody");
        assert!(meta.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_decode_skips_lines_without_separator() {
        let (meta, body) = decode("---\nnot a pair\nkey: \"v\"\n---\n\nb");
        assert_eq!(meta.len(), 1);
        assert_eq!(meta["key"], json!("v"));
        assert_eq!(body, "b");
    }

    #[test]
    fn test_encode_layout() {
        let mut meta = Metadata::new();
        meta.insert("lastSynced".to_string(), json!("2024-05-01T00:00:00Z"));
        meta.insert("remoteId".to_string(), json!("abc-123"));

        let out = encode(&meta, "# Spec\n\nHello\n\n");
        assert_eq!(
            out,
            "---\nlastSynced: \"2024-05-01T00:00:00Z\"\nremoteId: \"abc-123\"\n---\n\n# Spec\n\nHello\n\n"
        );
    }

    #[test]
    fn test_round_trip() {
        let mut meta = Metadata::new();
        meta.insert("remoteId".to_string(), json!("id-1"));
        meta.insert("retries".to_string(), json!(3));
        meta.insert("watch".to_string(), json!(false));
        let body = "content\n\nmore content\n";

        let (decoded_meta, decoded_body) = decode(&encode(&meta, body));
        assert_eq!(decoded_meta, meta);
        assert_eq!(decoded_body, body);
    }

    #[test]
    fn test_round_trip_empty_body() {
        let mut meta = Metadata::new();
        meta.insert("remoteId".to_string(), json!("id-1"));

        let (decoded_meta, decoded_body) = decode(&encode(&meta, ""));
        assert_eq!(decoded_meta, meta);
        assert_eq!(decoded_body, "");
    }
}

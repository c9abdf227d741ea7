//! RFC 5322 header parsing: folding, encoded-words (RFC 2047), and dates.

use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Unfolded header block of one message.
#[derive(Debug, Default)]
pub struct Headers {
    /// `(lowercase_name, value)` pairs in source order.
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Parse the header block of a raw message (everything up to the first
    /// blank line). The leading mbox `From ` separator line is ignored.
    pub fn parse(raw_message: &[u8]) -> Self {
        let end = header_end(raw_message);
        let text = decode_header_bytes(&raw_message[..end]);
        Self {
            fields: unfold_headers(&text),
        }
    }

    /// First value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `Message-ID` with surrounding text removed, if present.
    pub fn message_id(&self) -> Option<String> {
        self.get("message-id")
            .map(extract_angle_bracket)
            .filter(|id| !id.is_empty())
    }

    /// Decoded subject on a single line.
    pub fn subject(&self) -> String {
        let decoded = decode_encoded_words(self.get("subject").unwrap_or_default());
        collapse_line_breaks(&decoded)
    }

    /// Decoded `From:` value.
    pub fn from(&self) -> String {
        decode_encoded_words(self.get("from").unwrap_or_default())
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.get("date").and_then(parse_date)
    }
}

/// Byte length of the header block (up to, not including, the first blank line).
fn header_end(raw: &[u8]) -> usize {
    let mut pos = 0;
    for line in raw.split_inclusive(|&b| b == b'\n') {
        if line.iter().all(|&b| b == b'\n' || b == b'\r') {
            return pos;
        }
        pos += line.len();
    }
    raw.len()
}

/// Decode raw header bytes: UTF-8 first, Windows-1252 otherwise.
fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (starting with space or tab) onto the previous
/// header with a single space.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with("From ") && result.is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                let cont = line.trim();
                if !cont.is_empty() {
                    if !last.1.is_empty() {
                        last.1.push(' ');
                    }
                    last.1.push_str(cont);
                }
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_ascii_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
    }

    result
}

/// Replace any remaining CR/LF runs with a single space.
fn collapse_line_breaks(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_break = false;
    for ch in s.chars() {
        if ch == '\r' || ch == '\n' {
            if !in_break {
                out.push(' ');
            }
            in_break = true;
        } else {
            out.push(ch);
            in_break = false;
        }
    }
    out.trim().to_string()
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// Tokens that fail to decode are kept verbatim.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match try_decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`. Returns the text and the number of
/// bytes consumed after the opening `=?`.
fn try_decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];
    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => base64::engine::general_purpose::STANDARD
            .decode(encoded_text.trim())
            .ok()?,
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode Q-encoding: underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            warn!(charset = charset, "Unknown charset, falling back to UTF-8 lossy");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Extract the first `<…>` token, or the trimmed value if there is none.
fn extract_angle_bracket(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(start) = trimmed.find('<') {
        if let Some(end) = trimmed[start..].find('>') {
            return trimmed[start..start + end + 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Parse a `Date:` header value.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // mail-parser copes with obsolete zone names and missing fields
    let fake_msg = format!("Date: {trimmed}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    match DateTime::parse_from_rfc3339(&dt) {
        Ok(d) => Some(d.with_timezone(&Utc)),
        Err(_) => {
            warn!(date = trimmed, "Could not parse date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = b"From build at rtems.org  Wed Nov  1 00:00:00 2023\n\
From: build at rtems.org (build at rtems.org)\n\
Date: Wed, 01 Nov 2023 10:00:00 +0000\n\
Subject: Build tester1: PASSED 123/rtems-testsuite-arm\n\
\x20on linux-gnu\n\
Message-ID: <20231101.abc@rtems.org>\n\
\n\
Subject: not a header\n";

    #[test]
    fn test_headers_from_message() {
        let headers = Headers::parse(MESSAGE);
        assert_eq!(
            headers.subject(),
            "Build tester1: PASSED 123/rtems-testsuite-arm on linux-gnu"
        );
        assert_eq!(headers.message_id().as_deref(), Some("<20231101.abc@rtems.org>"));
        assert_eq!(headers.from(), "build at rtems.org (build at rtems.org)");
        assert_eq!(
            headers.date().unwrap().format("%Y-%m-%d").to_string(),
            "2023-11-01"
        );
    }

    #[test]
    fn test_body_is_not_parsed_as_headers() {
        let headers = Headers::parse(MESSAGE);
        assert_eq!(headers.fields.iter().filter(|(k, _)| k == "subject").count(), 1);
    }

    #[test]
    fn test_missing_message_id() {
        let headers = Headers::parse(b"Subject: hello\n\nbody\n");
        assert!(headers.message_id().is_none());
        assert_eq!(headers.subject(), "hello");
    }

    #[test]
    fn test_unfold_headers() {
        let text = "Subject: This is a long\n\tsubject line\nFrom: user@example.com\n";
        let headers = unfold_headers(text);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].1, "This is a long subject line");
    }

    #[test]
    fn test_collapse_line_breaks() {
        assert_eq!(collapse_line_breaks("a\r\nb\nc"), "a b c");
    }

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_encoded_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_encoded_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        let input = "=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=";
        assert_eq!(decode_encoded_words(input), "Hola mundo");
    }

    #[test]
    fn test_decode_keeps_invalid_words() {
        assert_eq!(decode_encoded_words("50% =? done"), "50% =? done");
    }

    #[test]
    fn test_extract_angle_bracket() {
        assert_eq!(extract_angle_bracket(" <msg001@example.com> "), "<msg001@example.com>");
        assert_eq!(extract_angle_bracket("bare-id"), "bare-id");
    }

    #[test]
    fn test_parse_date_rfc2822() {
        let dt = parse_date("Thu, 04 Jan 2024 10:00:00 +0000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-04");
        assert!(parse_date("").is_none());
    }
}

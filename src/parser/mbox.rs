//! Streaming mbox reader.
//!
//! Reads a decompressed archive line-by-line and hands each complete message
//! to a callback. Only the current message is held in memory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, StatusError};

/// Size of the internal read buffer.
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Messages larger than this have their body truncated (16 MB).
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Streaming mbox parser.
///
/// A message starts at a `From ` line that is the first line of the file or
/// follows a blank line. `From ` lines inside a body that are not preceded
/// by a blank line are kept as body text. Tolerates `\r\n` line endings, a
/// UTF-8 BOM and a truncated final message.
pub struct MboxParser {
    path: PathBuf,
    file_size: u64,
}

impl MboxParser {
    /// Create a parser for the given decompressed mailbox.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| StatusError::format(&path, e.to_string()))?;
        Ok(Self {
            path,
            file_size: metadata.len(),
        })
    }

    /// Parse the whole mailbox, calling `message_callback(offset, raw_bytes)`
    /// for each message. The callback returns `false` to stop early.
    ///
    /// Fails with `Format` if the first non-blank line is not a `From `
    /// separator. Returns the number of messages delivered.
    pub fn parse(&self, message_callback: &mut dyn FnMut(u64, &[u8]) -> bool) -> Result<u64> {
        if self.file_size == 0 {
            return Ok(0);
        }

        let file = File::open(&self.path).map_err(|e| StatusError::format(&self.path, e.to_string()))?;
        let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

        let mut count: u64 = 0;
        let mut current_offset: u64 = 0;
        let mut message_buf: Vec<u8> = Vec::with_capacity(64 * 1024);
        let mut message_start: u64 = 0;
        let mut prev_line_was_empty = true;
        let mut seen_separator = false;
        let mut truncated = false;
        let mut line_buf: Vec<u8> = Vec::with_capacity(4096);

        loop {
            line_buf.clear();
            let line_len = reader
                .read_until(b'\n', &mut line_buf)
                .map_err(|e| StatusError::format(&self.path, e.to_string()))?;
            if line_len == 0 {
                break;
            }

            if !seen_separator {
                if is_blank_line(&line_buf) {
                    current_offset += line_len as u64;
                    continue;
                }
                if !is_mbox_separator(&line_buf) {
                    return Err(StatusError::format(
                        &self.path,
                        format!("expected 'From ' separator at offset {current_offset}"),
                    ));
                }
            }

            if is_mbox_separator(&line_buf) && prev_line_was_empty {
                if seen_separator {
                    if !message_callback(message_start, &message_buf) {
                        return Ok(count);
                    }
                    count += 1;
                }
                seen_separator = true;
                truncated = false;
                message_start = current_offset;
                message_buf.clear();
                message_buf.extend_from_slice(&line_buf);
            } else if message_buf.len() + line_buf.len() <= MAX_MESSAGE_SIZE {
                message_buf.extend_from_slice(&line_buf);
            } else if !truncated {
                warn!(
                    offset = message_start,
                    max_size = MAX_MESSAGE_SIZE,
                    "Message exceeds maximum size, truncating body"
                );
                truncated = true;
            }

            prev_line_was_empty = is_blank_line(&line_buf);
            current_offset += line_len as u64;
        }

        if seen_separator && message_callback(message_start, &message_buf) {
            count += 1;
        }

        Ok(count)
    }
}

/// Check whether a line is an mbox separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}

//! Raw archived messages and their subject-based classification.

use chrono::{DateTime, Utc};

use super::sender::Sender;

/// A single message read from a monthly archive.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// `Message-ID` header value including angle brackets.
    pub message_id: String,

    /// Sender from the `From:` header.
    pub from: Sender,

    /// Decoded subject with line breaks collapsed to single spaces.
    pub subject: String,

    /// Parsed `Date:` header, when present and readable.
    pub date: Option<DateTime<Utc>>,

    /// Byte offset of the `From ` separator line in the decompressed mailbox.
    pub offset: u64,

    /// Full message bytes (separator line, headers and body).
    pub raw: Vec<u8>,
}

/// Message category, derived only from the subject prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageClass {
    Build,
    Test,
    BspBuild,
    Unknown,
}

/// Subject prefixes, checked in order. The first match wins.
const CLASS_PREFIXES: &[(&str, MessageClass)] = &[
    ("Build ", MessageClass::Build),
    ("[rtems-test] ", MessageClass::Test),
    ("[rtems-bsp-builder] ", MessageClass::BspBuild),
];

impl MessageClass {
    /// All classes in classification priority order.
    pub const ALL: [MessageClass; 4] = [
        MessageClass::Build,
        MessageClass::Test,
        MessageClass::BspBuild,
        MessageClass::Unknown,
    ];

    /// Classify a normalized subject line.
    pub fn classify(subject: &str) -> Self {
        CLASS_PREFIXES
            .iter()
            .find(|(prefix, _)| subject.starts_with(prefix))
            .map(|(_, class)| *class)
            .unwrap_or(MessageClass::Unknown)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MessageClass::Build => "builds",
            MessageClass::Test => "tests",
            MessageClass::BspBuild => "bsp-builds",
            MessageClass::Unknown => "unknown",
        }
    }
}

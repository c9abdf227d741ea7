//! Parsing of one or more gzip-compressed monthly archives into classified,
//! deduplicated messages.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, StatusError};
use crate::model::message::{MessageClass, RawMessage};
use crate::model::sender::Sender;
use crate::parser::header::Headers;
use crate::parser::mbox::MboxParser;

/// Messages read from archive files, keyed by `Message-ID`.
///
/// A `Message-ID` seen twice within the same `MailArchive` is skipped, so
/// ingesting the same archive again leaves every set unchanged. Messages
/// with an unrecognized subject are kept under [`MessageClass::Unknown`].
#[derive(Debug, Default)]
pub struct MailArchive {
    messages: HashMap<String, RawMessage>,
    order: Vec<String>,
    classes: HashMap<MessageClass, Vec<String>>,
    senders: BTreeMap<String, Vec<String>>,
    duplicates: u64,
}

impl MailArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single compressed archive.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let mut archive = Self::new();
        archive.ingest(path)?;
        Ok(archive)
    }

    /// Decompress and read another archive into this one. Returns the number
    /// of new (not previously seen) messages.
    ///
    /// The decompressed copy lives in a scratch file in the system temp
    /// directory; see [`ingest_in`](Self::ingest_in).
    pub fn ingest(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        self.ingest_in(path, std::env::temp_dir())
    }

    /// [`ingest`](Self::ingest) with the scratch file placed in
    /// `scratch_dir`. The scratch file is removed when this call returns,
    /// whether or not it succeeds.
    pub fn ingest_in(
        &mut self,
        path: impl AsRef<Path>,
        scratch_dir: impl AsRef<Path>,
    ) -> Result<usize> {
        let path = path.as_ref();
        let scratch = decompress(path, scratch_dir.as_ref())?;
        let parser = MboxParser::new(scratch.path())?;

        let before = self.order.len();
        let skipped_before = self.duplicates;
        let total = parser.parse(&mut |offset, bytes| {
            self.add(offset, bytes);
            true
        })?;

        let added = self.order.len() - before;
        info!(
            path = %path.display(),
            messages = total,
            added,
            duplicates = self.duplicates - skipped_before,
            "Parsed archive"
        );
        Ok(added)
    }

    /// Record one raw message unless its id was already seen.
    fn add(&mut self, offset: u64, bytes: &[u8]) {
        let headers = Headers::parse(bytes);
        let message_id = headers
            .message_id()
            .unwrap_or_else(|| synthetic_message_id(bytes));

        if self.messages.contains_key(&message_id) {
            debug!(message_id = %message_id, "Skipping duplicate message");
            self.duplicates += 1;
            return;
        }

        let message = RawMessage {
            message_id: message_id.clone(),
            from: Sender::parse(&headers.from()),
            subject: headers.subject(),
            date: headers.date(),
            offset,
            raw: bytes.to_vec(),
        };

        let class = MessageClass::classify(&message.subject);
        self.classes
            .entry(class)
            .or_default()
            .push(message_id.clone());
        self.senders
            .entry(message.from.address.clone())
            .or_default()
            .push(message_id.clone());
        self.order.push(message_id.clone());
        self.messages.insert(message_id, message);
    }

    /// Number of distinct messages.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of messages skipped because their id was already present.
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Look up a message by id.
    pub fn message(&self, message_id: &str) -> Option<&RawMessage> {
        self.messages.get(message_id)
    }

    /// Message ids in a class, in arrival order.
    pub fn ids(&self, class: MessageClass) -> &[String] {
        self.classes.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Messages in a class, in arrival order.
    pub fn messages(&self, class: MessageClass) -> impl Iterator<Item = &RawMessage> {
        self.ids(class).iter().filter_map(|id| self.messages.get(id))
    }

    /// Build-report messages, in arrival order.
    pub fn build_messages(&self) -> impl Iterator<Item = &RawMessage> {
        self.messages(MessageClass::Build)
    }

    /// Message ids grouped by sender address.
    pub fn by_sender(&self) -> &BTreeMap<String, Vec<String>> {
        &self.senders
    }

    pub fn has_unclassifiable(&self) -> bool {
        !self.ids(MessageClass::Unknown).is_empty()
    }

    /// Subjects of unclassified messages, in arrival order.
    pub fn list_unclassifiable(&self) -> Vec<&str> {
        self.messages(MessageClass::Unknown)
            .map(|m| m.subject.as_str())
            .collect()
    }
}

impl fmt::Display for MailArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "messages: {}", self.len())?;
        for class in MessageClass::ALL {
            write!(f, "\n{}: {}", class.name(), self.ids(class).len())?;
        }
        Ok(())
    }
}

/// Gunzip every member of `path` into a scratch file in `scratch_dir`.
fn decompress(path: &Path, scratch_dir: &Path) -> Result<tempfile::NamedTempFile> {
    let file = File::open(path).map_err(|e| StatusError::format(path, e.to_string()))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(file));
    let scratch = tempfile::Builder::new()
        .prefix("buildstat-")
        .suffix(".mbox")
        .tempfile_in(scratch_dir)
        .map_err(|e| StatusError::storage(scratch_dir, e))?;

    let mut writer = BufWriter::new(scratch.as_file());
    std::io::copy(&mut decoder, &mut writer)
        .map_err(|e| StatusError::format(path, format!("gzip: {e}")))?;
    writer
        .flush()
        .map_err(|e| StatusError::storage(scratch.path(), e))?;
    drop(writer);

    debug!(path = %path.display(), scratch = %scratch.path().display(), "Decompressed archive");
    Ok(scratch)
}

/// Stable id for a message without a `Message-ID` header.
fn synthetic_message_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let hex: String = digest[..12].iter().map(|b| format!("{b:02x}")).collect();
    format!("<sha256-{hex}@buildstat.invalid>")
}

//! Shared fixtures: an in-memory archive server and mbox builders.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use flate2::write::GzEncoder;
use flate2::Compression;

use buildstat::cache::{ArchiveSource, FetchResponse};
use buildstat::error::{Result, StatusError};

#[derive(Default)]
struct ServerState {
    files: std::collections::HashMap<String, (Vec<u8>, Option<String>)>,
    fetches: Vec<String>,
    report_length: bool,
    claimed_length: Option<u64>,
}

/// Serves gzip archives from memory and records every request.
#[derive(Clone, Default)]
pub struct FakeServer {
    state: Rc<RefCell<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        let server = Self::default();
        server.state.borrow_mut().report_length = true;
        server
    }

    /// Publish `body` at `url` with an optional ETag.
    pub fn publish(&self, url: &str, body: Vec<u8>, etag: Option<&str>) {
        self.state
            .borrow_mut()
            .files
            .insert(url.to_string(), (body, etag.map(str::to_string)));
    }

    pub fn report_length(&self, report: bool) {
        self.state.borrow_mut().report_length = report;
    }

    /// Claim a `Content-Length` that differs from the body.
    pub fn claim_length(&self, length: Option<u64>) {
        self.state.borrow_mut().claimed_length = length;
    }

    pub fn fetch_count(&self) -> usize {
        self.state.borrow().fetches.len()
    }
}

impl ArchiveSource for FakeServer {
    fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let mut state = self.state.borrow_mut();
        state.fetches.push(url.to_string());
        let (body, etag) = state.files.get(url).cloned().ok_or_else(|| StatusError::Download {
            url: url.to_string(),
            reason: "404 Not Found".to_string(),
        })?;
        let content_length = match state.claimed_length {
            Some(len) => Some(len),
            None if state.report_length => Some(body.len() as u64),
            None => None,
        };
        Ok(FetchResponse {
            etag,
            content_length,
            body: Box::new(std::io::Cursor::new(body)),
        })
    }
}

/// One mbox message in list-archive form.
pub fn message(id: &str, subject: &str) -> String {
    format!(
        "From build at rtems.org  Wed Nov  1 00:00:00 2023\n\
         From: build at rtems.org (build at rtems.org)\n\
         Date: Wed, 01 Nov 2023 10:00:00 +0000\n\
         Subject: {subject}\n\
         Message-ID: <{id}>\n\
         \n\
         Build log follows.\n\
         \n"
    )
}

/// Gzip-compress a mailbox.
pub fn gzip(content: &str) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(content.as_bytes()).unwrap();
    enc.finish().unwrap()
}

/// Build a gzip mailbox from `(message_id, subject)` pairs.
pub fn archive(messages: &[(&str, &str)]) -> Vec<u8> {
    let mbox: String = messages.iter().map(|(id, s)| message(id, s)).collect();
    gzip(&mbox)
}

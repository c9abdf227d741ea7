//! Build-report subject parsing.
//!
//! A build subject has the form
//!
//! ```text
//! Build <host>: <PASSED|FAILED> <buildset> on <os> [ignored...]
//! ```
//!
//! Older archives leave `<host>` empty; the host is then inferred from the
//! OS token with [`hosts::infer_host`].

pub mod hosts;

use tracing::{debug, warn};

use crate::error::{Result, StatusError};
use crate::model::build::{BuildRecord, BuildResult, MonthResults};
use crate::model::message::RawMessage;
use crate::model::month::MonthKey;

/// Parse one build subject into a [`BuildRecord`].
pub fn parse_subject(subject: &str) -> Result<BuildRecord> {
    let (left, right) = subject
        .split_once(':')
        .ok_or_else(|| StatusError::grammar(subject, "missing ':'"))?;

    let host = match left.strip_prefix("Build") {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => return Err(StatusError::grammar(subject, "missing 'Build ' prefix")),
    };

    let tokens: Vec<&str> = right.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(StatusError::grammar(
            subject,
            format!("expected at least 4 tokens after ':', found {}", tokens.len()),
        ));
    }
    if tokens[2] != "on" {
        return Err(StatusError::grammar(
            subject,
            format!("expected 'on', found '{}'", tokens[2]),
        ));
    }

    let result = BuildResult::from_token(tokens[0]).ok_or_else(|| {
        StatusError::grammar(subject, format!("invalid build result '{}'", tokens[0]))
    })?;
    let buildset = tokens[1];
    let os = tokens[3];
    let host = if host.is_empty() {
        hosts::infer_host(os)
    } else {
        host
    };

    BuildRecord::new(result, host, buildset, os)
        .map_err(|_| StatusError::grammar(subject, "empty field"))
}

/// Extract every build message of a month, failing on the first subject
/// that does not parse.
pub fn extract<'a>(
    month: MonthKey,
    messages: impl IntoIterator<Item = &'a RawMessage>,
) -> Result<MonthResults> {
    let records = messages
        .into_iter()
        .map(|m| parse_subject(&m.subject))
        .collect::<Result<Vec<_>>>()?;
    debug!(month = %month, records = records.len(), "Extracted build results");
    Ok(MonthResults::new(month, records))
}

/// Extract build messages, skipping subjects that do not parse.
///
/// The skipped subjects are returned as `SubjectGrammar` errors alongside the
/// results so the caller can report them.
pub fn extract_lenient<'a>(
    month: MonthKey,
    messages: impl IntoIterator<Item = &'a RawMessage>,
) -> (MonthResults, Vec<StatusError>) {
    let mut records = Vec::new();
    let mut skipped = Vec::new();
    for message in messages {
        match parse_subject(&message.subject) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(month = %month, message_id = %message.message_id, error = %e, "Skipping build message");
                skipped.push(e);
            }
        }
    }
    (MonthResults::new(month, records), skipped)
}

//! Sender address parsing for archived build-report mail.
//!
//! Mailing-list text exports obfuscate addresses, so besides the RFC 5322
//! forms this also accepts the `user at host (Name)` spelling.

/// A parsed sender.
///
/// # Examples
/// - `"Build Bot <build@rtems.org>"` → `name = "Build Bot"`, `address = "build@rtems.org"`
/// - `"build at rtems.org (Build Bot)"` → `name = "Build Bot"`, `address = "build@rtems.org"`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Sender {
    /// Human-readable name (may be empty).
    pub name: String,
    /// The bare address, lowercased.
    pub address: String,
}

impl Sender {
    /// Parse a `From:` header value. Unrecognized input is kept as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        // "Display Name <address>" or "<address>"
        if let (Some(start), Some(end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if end > start {
                return Self {
                    name: strip_quotes(&trimmed[..start]),
                    address: trimmed[start + 1..end].trim().to_lowercase(),
                };
            }
        }

        // "address (Display Name)"
        let (addr_part, name) = match (trimmed.find('('), trimmed.rfind(')')) {
            (Some(start), Some(end)) if end > start => (
                trimmed[..start].trim(),
                trimmed[start + 1..end].trim().to_string(),
            ),
            _ => (trimmed, String::new()),
        };

        Self {
            name,
            address: deobfuscate(addr_part).to_lowercase(),
        }
    }
}

/// Undo the `user at host` obfuscation used by list archives.
fn deobfuscate(s: &str) -> String {
    match s.split_once(" at ") {
        Some((user, host)) if !user.contains(' ') && !host.trim().contains(' ') => {
            format!("{}@{}", user, host.trim())
        }
        _ => s.to_string(),
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

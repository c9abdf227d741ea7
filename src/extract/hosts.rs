//! Host names inferred for legacy build reports that carried no host.

/// `(os substring, host)` pairs, checked in order. Add new OS spellings here.
pub const LEGACY_HOST_HINTS: &[(&str, &str)] = &[
    ("linux", "Linux"),
    ("freebsd", "FreeBSD"),
    ("w64-mingw32", "MINGW64_NT-10.0"),
    ("darwin", "Darwin"),
];

/// Host used when no hint matches.
pub const UNKNOWN_HOST: &str = "unknown";

/// Infer a host from an OS token such as `x86_64-freebsd12`.
pub fn infer_host(os: &str) -> &'static str {
    LEGACY_HOST_HINTS
        .iter()
        .find(|(needle, _)| os.contains(needle))
        .map(|(_, host)| *host)
        .unwrap_or(UNKNOWN_HOST)
}

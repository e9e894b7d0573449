//! Host normalization
//!
//! Blocklist data arrives as a mix of bare hosts and full URLs, and the
//! tunnel sees whatever case the resolver stub used. Load-time data goes
//! through [`normalize_host`]; names seen on the wire go through
//! [`normalize_domain`], which never reinterprets URL syntax.

/// Reduce a host or URL to its comparable form.
///
/// Lowercases, drops any scheme, userinfo, port, path, query and trailing
/// dot, then strips one leading `www.`. Returns `None` when nothing usable
/// remains.
pub fn normalize_host(input: &str) -> Option<String> {
    let lowered = input.trim().to_ascii_lowercase();
    let mut rest = lowered.as_str();

    if let Some((_, after)) = rest.split_once("://") {
        rest = after;
    }

    // Authority ends at the first path, query or fragment delimiter
    if let Some(end) = rest.find(|c: char| matches!(c, '/' | '?' | '#')) {
        rest = &rest[..end];
    }

    if let Some((_, host)) = rest.rsplit_once('@') {
        rest = host;
    }

    if let Some((host, port)) = rest.rsplit_once(':') {
        if port.chars().all(|c| c.is_ascii_digit()) {
            rest = host;
        }
    }

    let rest = rest.trim_end_matches('.');
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    if rest.is_empty() || rest.contains(char::is_whitespace) {
        return None;
    }
    Some(rest.to_string())
}

/// Reduce an observed DNS name to its comparable form.
///
/// Lowercases, drops the trailing dot and one leading `www.`. Unlike
/// [`normalize_host`] nothing is stripped from the middle of the name: any
/// byte outside `[a-z0-9_-]` or an empty label rejects it, so `evil@host`
/// can never be read as `host`.
pub fn normalize_domain(name: &str) -> Option<String> {
    let lowered = name.trim().to_ascii_lowercase();
    let rest = lowered.trim_end_matches('.');
    let rest = rest.strip_prefix("www.").unwrap_or(rest);

    if rest.is_empty() {
        return None;
    }
    let valid = rest.split('.').all(|label| {
        !label.is_empty() && label.bytes().all(is_hostname_byte)
    });
    valid.then(|| rest.to_string())
}

/// Whether `b` may appear in a hostname label
pub fn is_hostname_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

/// Iterate a host and each of its parent domains, most specific first.
///
/// `a.b.example.com` yields `a.b.example.com`, `b.example.com`,
/// `example.com`, `com`.
pub fn suffixes(host: &str) -> impl Iterator<Item = &str> {
    let mut next = Some(host);
    std::iter::from_fn(move || {
        let current = next?;
        next = current.find('.').map(|pos| &current[pos + 1..]).filter(|s| !s.is_empty());
        Some(current)
    })
}

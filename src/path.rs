//! Node paths look like `r:0:c:b30:b90`: a fixed root prefix followed by one
//! colon-separated token per action taken.

pub const ROOT_PREFIX: &str = "r:0";

pub fn last_token(path: &str) -> &str {
    match path.rfind(':') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Paths with at most one separator start a walk.
pub fn is_root(path: &str) -> bool {
    path.matches(':').count() <= 1
}

/// Action tokens after the root prefix, or `None` when the path does not
/// start with it.
pub fn actions(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix(ROOT_PREFIX)?;
    let rest = rest.strip_prefix(':').unwrap_or(rest);
    Some(
        rest.split(':')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect(),
    )
}

/// A bet (`b<n>`) or raise (`r<n>`) token.
pub fn is_aggressive(token: &str) -> bool {
    token.starts_with('b') || token.starts_with('r')
}

/// Amount of a `b<digits>` token.
pub fn bet_amount(token: &str) -> Option<u64> {
    let digits = token.strip_prefix('b')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

//! Line splitting: command name, flags and the argument tail.

use crate::CmdInfo;

/// Drops leading whitespace and `:` characters.
pub(crate) fn strip_prompt(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == ':' || c.is_whitespace())
}

/// Splits the typed command name off `s`.
///
/// `!` alone is a name. Otherwise the name is the run of ASCII letters,
/// extended by a trailing `!` or `?` when `registered` knows the longer
/// name.
pub(crate) fn split_name<'a>(s: &'a str, registered: impl Fn(&str) -> bool) -> (&'a str, &'a str) {
    if s.starts_with('!') {
        return s.split_at(1);
    }
    let len = s
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(s.len());
    if matches!(s[len..].chars().next(), Some('!' | '?')) && registered(&s[..len + 1]) {
        return s.split_at(len + 1);
    }
    s.split_at(len)
}

/// Whether `s` could still grow into a longer name.
pub(crate) fn is_partial_name(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Consumes the bang/query flag and the separator from the tail and
/// returns the raw argument text.
pub(crate) fn parse_tail<'a>(tail: &'a str, custom_separator: bool, info: &mut CmdInfo) -> &'a str {
    let mut rest = tail;
    if let Some(after) = rest.strip_prefix('!') {
        info.bang = true;
        rest = after;
    } else if let Some(after) = rest.strip_prefix('?') {
        info.query = true;
        rest = after;
    }

    // The separator is the character right after the name and flag; a
    // blank there leaves the default space.
    if custom_separator
        && let Some(sep) = rest.chars().next()
        && !sep.is_whitespace()
    {
        info.separator = sep;
        return rest.trim_start_matches(sep);
    }
    rest.trim_start()
}

/// Splits a trailing ` &` off the argument text.
pub(crate) fn strip_background(args: &str) -> Option<&str> {
    let trimmed = args.trim_end();
    let head = trimmed.strip_suffix('&')?;
    if head.is_empty() {
        Some(head)
    } else if head.ends_with(char::is_whitespace) {
        Some(head.trim_end())
    } else {
        None
    }
}

//! Range prefix of a command line.
//!
//! Limits: `%` (everything), `$` (last), `.` (current), `'x` (mark), a
//! 1-based number, or nothing between commas (current). Limits are chained
//! with `,` and only the last two survive: each new limit becomes the end
//! and the previous end becomes the begin.

use tracing::trace;

use crate::{CmdError, CmdHost, CmdRange};

enum Limit {
    Whole(usize, usize),
    At(usize),
}

/// Parses an optional range from the start of `line`, returning it with
/// the unparsed remainder.
pub(crate) fn parse_range<'a, H: CmdHost>(
    line: &'a str,
    host: &mut H,
) -> Result<(Option<CmdRange>, &'a str), CmdError> {
    let mut rest = line.trim_start();
    match rest.chars().next() {
        None => return Ok((None, rest)),
        Some(c) if c.is_ascii_alphabetic() || c == '!' => return Ok((None, rest)),
        Some(_) => {}
    }

    let mut begin: Option<usize> = None;
    let mut end: Option<usize> = None;
    let mut after_comma = false;
    loop {
        let (limit, after) = parse_limit(rest, host)?;
        let limit = match limit {
            None if after_comma || after.starts_with(',') => Some(Limit::At(host.current_index())),
            other => other,
        };
        match limit {
            Some(Limit::Whole(b, e)) => {
                begin = Some(b);
                end = Some(e);
            }
            Some(Limit::At(idx)) => {
                begin = end;
                end = Some(idx);
            }
            None => {}
        }
        rest = after.trim_start();
        match rest.strip_prefix(',') {
            Some(tail) => {
                rest = tail.trim_start();
                after_comma = true;
            }
            None => break,
        }
    }

    let Some(end) = end else {
        return Ok((None, rest));
    };
    let begin = begin.unwrap_or(end);
    let range = if end < begin {
        if !host.swap_range() {
            trace!(target: "cmds.parse", begin, end, "inverted_range_refused");
            return Err(CmdError::InvalidRange);
        }
        CmdRange::new(end, begin)
    } else {
        CmdRange::new(begin, end)
    };
    trace!(target: "cmds.parse", begin = range.begin, end = range.end, "range");
    Ok((Some(range), rest))
}

fn parse_limit<'a, H: CmdHost>(
    s: &'a str,
    host: &mut H,
) -> Result<(Option<Limit>, &'a str), CmdError> {
    let Some(first) = s.chars().next() else {
        return Ok((None, s));
    };
    let limit = match first {
        '%' => Limit::Whole(host.first_index(), host.last_index()),
        '$' => Limit::At(host.last_index()),
        '.' => Limit::At(host.current_index()),
        '\'' => {
            let mut chars = s[1..].chars();
            let mark = chars.next().ok_or(CmdError::InvalidRange)?;
            let idx = host.resolve_mark(mark).ok_or(CmdError::InvalidRange)?;
            return Ok((Some(Limit::At(idx)), chars.as_str()));
        }
        c if c.is_ascii_digit() => {
            let digits = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
            let number = s[..digits]
                .bytes()
                .fold(0usize, |acc, b| acc.saturating_mul(10).saturating_add((b - b'0') as usize));
            let idx = number.saturating_sub(1).max(host.first_index());
            return Ok((Some(Limit::At(idx)), &s[digits..]));
        }
        _ => return Ok((None, s)),
    };
    Ok((Some(limit), &s[1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines {
        current: usize,
        last: usize,
        swap: bool,
    }

    impl CmdHost for Lines {
        fn current_index(&self) -> usize {
            self.current
        }

        fn last_index(&self) -> usize {
            self.last
        }

        fn resolve_mark(&mut self, mark: char) -> Option<usize> {
            (mark == 'a').then_some(7)
        }

        fn swap_range(&mut self) -> bool {
            self.swap
        }
    }

    fn lines() -> Lines {
        Lines {
            current: 4,
            last: 9,
            swap: false,
        }
    }

    fn parse(line: &str) -> Result<(Option<CmdRange>, String), CmdError> {
        parse_range(line, &mut lines()).map(|(r, rest)| (r, rest.to_string()))
    }

    #[test]
    fn no_range_before_name() {
        assert_eq!(parse("  delete").unwrap(), (None, "delete".into()));
        assert_eq!(parse("!ls").unwrap(), (None, "!ls".into()));
        assert_eq!(parse("").unwrap(), (None, "".into()));
    }

    #[test]
    fn only_last_two_limits_survive() {
        assert_eq!(
            parse("1,2,3delete").unwrap(),
            (Some(CmdRange::new(1, 2)), "delete".into())
        );
    }

    #[test]
    fn symbolic_limits() {
        assert_eq!(parse("%d").unwrap().0, Some(CmdRange::new(0, 9)));
        assert_eq!(parse(".,$d").unwrap().0, Some(CmdRange::new(4, 9)));
        assert_eq!(parse("'a d").unwrap().0, Some(CmdRange::single(7)));
        assert_eq!(parse("5d").unwrap().0, Some(CmdRange::single(4)));
    }

    #[test]
    fn empty_limits_mean_current() {
        assert_eq!(parse(",7d").unwrap().0, Some(CmdRange::new(4, 6)));
        assert_eq!(parse("3,d").unwrap().0, Some(CmdRange::new(2, 4)));
        assert_eq!(parse("6,d"), Err(CmdError::InvalidRange));
    }

    #[test]
    fn zero_is_clamped_to_first_index() {
        assert_eq!(parse("0d").unwrap().0, Some(CmdRange::single(0)));
    }

    #[test]
    fn bad_mark_is_invalid() {
        assert_eq!(parse("'zd"), Err(CmdError::InvalidRange));
        assert_eq!(parse("'"), Err(CmdError::InvalidRange));
    }

    #[test]
    fn inverted_range_needs_permission() {
        assert_eq!(parse("3,1d"), Err(CmdError::InvalidRange));
        let mut host = Lines {
            swap: true,
            ..lines()
        };
        let (range, _) = parse_range("3,1d", &mut host).unwrap();
        assert_eq!(range, Some(CmdRange::new(0, 2)));
    }
}

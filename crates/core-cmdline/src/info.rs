//! The per-call command invocation.

use std::fmt::Write as _;

/// Inclusive range of zero-based indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmdRange {
    pub begin: usize,
    pub end: usize,
}

impl CmdRange {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    pub fn single(index: usize) -> Self {
        Self::new(index, index)
    }

    /// Number of addressed indexes.
    pub fn count(&self) -> usize {
        self.end.saturating_sub(self.begin) + 1
    }

    pub fn indexes(&self) -> std::ops::RangeInclusive<usize> {
        self.begin..=self.end
    }
}

/// One parsed command invocation, owned by the call that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdInfo {
    /// Registered name the typed name resolved to.
    pub name: String,
    pub range: Option<CmdRange>,
    pub bang: bool,
    pub query: bool,
    pub separator: char,
    /// Argument text as typed.
    pub raw_args: String,
    /// Argument text after macro expansion and `&` stripping.
    pub args: String,
    pub argv: Vec<String>,
    pub background: bool,
    /// Body of a user-defined command.
    pub user_body: Option<String>,
}

impl CmdInfo {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            range: None,
            bang: false,
            query: false,
            separator: ' ',
            raw_args: String::new(),
            args: String::new(),
            argv: Vec::new(),
            background: false,
            user_body: None,
        }
    }

    pub fn arg(&self, idx: usize) -> Option<&str> {
        self.argv.get(idx).map(String::as_str)
    }

    /// Renders the invocation back into a line that parses to the same
    /// range, flags and arguments. Range limits become 1-based numbers and
    /// every argument is single-quoted.
    pub fn to_command_line(&self) -> String {
        let mut line = String::new();
        if let Some(range) = self.range {
            let _ = write!(line, "{},{}", range.begin + 1, range.end + 1);
        }
        line.push_str(&self.name);
        if self.bang {
            line.push('!');
        } else if self.query {
            line.push('?');
        }
        if self.separator == ' ' {
            for arg in &self.argv {
                line.push(' ');
                line.push_str(&quote(arg));
            }
        } else if !self.argv.is_empty() {
            line.push(self.separator);
            for arg in &self.argv {
                line.push_str(&quote(arg));
                line.push(self.separator);
            }
        }
        if self.background {
            line.push_str(" &");
        }
        line
    }
}

fn quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "''"))
}

//! Argument tokenizer.
//!
//! Lexical states, entered only at the start of a token:
//! * unquoted: ends at the separator (any whitespace when the separator is
//!   a space); `\x` yields `x`;
//! * `'single'`: `''` folds to one quote, nothing else is special;
//! * `"double"`: C-like escapes (`\n`, `\t`, ...);
//! * `/slash/`: only with regexp arguments and the space separator; `\/`
//!   folds to `/`, other escapes are kept for the regex engine.
//!
//! An unterminated quote fails the whole line.

use std::iter::Peekable;
use std::str::Chars;

use crate::CmdError;

pub struct ArgScanner<'a> {
    chars: Peekable<Chars<'a>>,
    sep: char,
    regexp: bool,
    failed: bool,
}

impl<'a> ArgScanner<'a> {
    pub fn new(args: &'a str, sep: char, regexp: bool) -> Self {
        Self {
            chars: args.chars().peekable(),
            sep,
            regexp,
            failed: false,
        }
    }

    fn is_sep(&self, ch: char) -> bool {
        if self.sep == ' ' {
            ch.is_whitespace()
        } else {
            ch == self.sep
        }
    }

    fn skip_sep(&mut self) {
        if self.sep == ' ' {
            while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
        } else {
            self.chars.next_if_eq(&self.sep);
        }
    }

    fn single_quoted(&mut self) -> Option<String> {
        let mut token = String::new();
        loop {
            match self.chars.next()? {
                '\'' if self.chars.next_if_eq(&'\'').is_some() => token.push('\''),
                '\'' => return Some(token),
                ch => token.push(ch),
            }
        }
    }

    fn double_quoted(&mut self) -> Option<String> {
        let mut token = String::new();
        loop {
            match self.chars.next()? {
                '\\' => token.push(unescape(self.chars.next()?)),
                '"' => return Some(token),
                ch => token.push(ch),
            }
        }
    }

    fn slash_quoted(&mut self) -> Option<String> {
        let mut token = String::new();
        loop {
            match self.chars.next()? {
                '\\' => match self.chars.next()? {
                    '/' => token.push('/'),
                    ch => {
                        token.push('\\');
                        token.push(ch);
                    }
                },
                '/' => return Some(token),
                ch => token.push(ch),
            }
        }
    }

    fn unquoted(&mut self) -> String {
        let mut token = String::new();
        while let Some(&ch) = self.chars.peek() {
            if self.is_sep(ch) {
                break;
            }
            self.chars.next();
            if ch == '\\' {
                token.push(self.chars.next().unwrap_or('\\'));
            } else {
                token.push(ch);
            }
        }
        token
    }
}

impl Iterator for ArgScanner<'_> {
    type Item = Result<String, CmdError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.sep == ' ' {
            self.skip_sep();
        }
        let first = *self.chars.peek()?;
        let quoted = match first {
            '\'' => {
                self.chars.next();
                Some(self.single_quoted())
            }
            '"' => {
                self.chars.next();
                Some(self.double_quoted())
            }
            '/' if self.regexp && self.sep == ' ' => {
                self.chars.next();
                Some(self.slash_quoted())
            }
            _ => None,
        };
        let token = match quoted {
            Some(Some(token)) => token,
            Some(None) => {
                self.failed = true;
                return Some(Err(CmdError::InvalidArguments));
            }
            None => self.unquoted(),
        };
        if self.sep != ' ' {
            self.skip_sep();
        }
        Some(Ok(token))
    }
}

/// Tokenizes a whole argument string.
pub fn split_args(args: &str, sep: char, regexp: bool) -> Result<Vec<String>, CmdError> {
    ArgScanner::new(args, sep, regexp).collect()
}

fn unescape(ch: char) -> char {
    match ch {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0c}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0b}',
        other => other,
    }
}

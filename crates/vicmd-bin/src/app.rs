//! Glue between the key dispatcher, the command engine and the host.
//!
//! Keys arrive one at a time and collect in a buffer until the dispatcher
//! stops waiting for more. Work handlers queue on the host (mappings,
//! command lines, completion) runs here once the dispatcher returns.

use std::time::Duration;

use anyhow::{Context, Result};
use core_cmdline::{CmdResult, Commands};
use core_config::Config;
use core_keymap::{KeyOutcome, Keys};
use tracing::{debug, trace, warn};

use crate::bindings::{self, BACKSPACE, ENTER, ESC, TAB};
use crate::commands;
use crate::host::{Host, Mode, Pending};

/// Chord timeout used when the configuration does not override it.
const DEFAULT_TIMEOUTLEN: Duration = Duration::from_millis(1000);

pub struct App {
    keys: Keys<Host>,
    cmds: Commands<Host>,
    pub host: Host,
    /// Keys typed since the dispatcher last finished a sequence.
    buffer: String,
    /// `None` waits forever for the rest of an unbound prefix.
    timeout: Option<Duration>,
    /// Applies to bound prefixes of longer chords, even without `timeout`.
    timeoutlen: Duration,
}

impl App {
    pub fn new(items: Vec<String>) -> Result<Self> {
        let keys = bindings::keys().context("installing key bindings")?;
        let mut cmds = Commands::new(true);
        commands::install(&mut cmds).context("installing commands")?;
        Ok(Self {
            keys,
            cmds,
            host: Host::new(items),
            buffer: String::new(),
            timeout: Some(DEFAULT_TIMEOUTLEN),
            timeoutlen: DEFAULT_TIMEOUTLEN,
        })
    }

    /// Installs the mappings and user commands of `config`. Entries that
    /// fail are logged and skipped.
    pub fn apply_config(&mut self, config: &Config) {
        self.timeout = config.chord_timeout();
        self.timeoutlen = Duration::from_millis(u64::from(config.file.input.timeoutlen));

        for entry in &config.file.map {
            let mode = Mode::from_config(entry.mode);
            let lhs = parse_key_notation(&entry.lhs);
            let rhs = parse_key_notation(&entry.rhs);
            if let Err(e) = self.keys.add_user_keys(&lhs, &rhs, mode.index()) {
                warn!(target: "config", lhs = %entry.lhs, error = %e, "map_rejected");
            }
        }
        for entry in &config.file.command {
            let line = format!("command! {} {}", entry.name, entry.body);
            if let Err(e) = self.cmds.execute_cmd(&mut self.host, &line) {
                warn!(target: "config", name = %entry.name, error = %e, "command_rejected");
            }
        }
        self.drain();
    }

    pub fn pending_keys(&self) -> &str {
        &self.buffer
    }

    /// How long to wait for the next key before flushing the buffer.
    pub fn wait_for(&self, outcome: KeyOutcome) -> Option<Duration> {
        match outcome {
            KeyOutcome::Wait => self.timeout,
            KeyOutcome::WaitShort => Some(self.timeoutlen),
            _ => None,
        }
    }

    pub fn feed_key(&mut self, key: char) -> KeyOutcome {
        self.buffer.push(key);
        let (outcome, pending) = self.keys.execute_keys_partial(&mut self.host, &self.buffer);
        trace!(target: "host", keys = %self.buffer, pending, ?outcome, "feed_key");
        self.settle(outcome, pending)
    }

    /// Runs whatever the buffer holds as if no more keys will come.
    pub fn flush_timeout(&mut self) -> KeyOutcome {
        if self.buffer.is_empty() {
            return KeyOutcome::Done(0);
        }
        let outcome = self.keys.execute_keys_timed_out(&mut self.host, &self.buffer);
        debug!(target: "host", keys = %self.buffer, ?outcome, "chord_timeout");
        self.buffer.clear();
        self.drain();
        outcome
    }

    /// Keeps the `pending` trailing keys of the buffer; chords before them
    /// already ran.
    fn settle(&mut self, outcome: KeyOutcome, pending: usize) -> KeyOutcome {
        match outcome {
            KeyOutcome::Wait | KeyOutcome::WaitShort => {
                let ran = self.buffer.chars().count().saturating_sub(pending);
                if let Some((at, _)) = self.buffer.char_indices().nth(ran) {
                    self.buffer.drain(..at);
                }
            }
            KeyOutcome::Unknown => {
                debug!(target: "host", keys = %self.buffer, "unknown_keys");
                self.buffer.clear();
            }
            KeyOutcome::RecursionLimit => {
                self.host.report("Mapping recursion is too deep");
                self.buffer.clear();
            }
            KeyOutcome::Done(_) => self.buffer.clear(),
        }
        self.drain();
        outcome
    }

    /// Feeds every key of `seq`, then flushes what is left pending.
    pub fn feed_keys(&mut self, seq: &str) -> KeyOutcome {
        let mut outcome = KeyOutcome::Done(0);
        for key in seq.chars() {
            outcome = self.feed_key(key);
        }
        if outcome.is_wait() {
            outcome = self.flush_timeout();
        }
        outcome
    }

    pub fn run_command(&mut self, line: &str) -> CmdResult {
        let result = self.exec_line(line);
        self.drain();
        result
    }

    /// A line starting with `:` is a command line, anything else is keys in
    /// `<Key>` notation.
    pub fn run_script_line(&mut self, line: &str) {
        match line.strip_prefix(':') {
            Some(cmd) => {
                let _ = self.run_command(cmd);
            }
            None => {
                self.feed_keys(&parse_key_notation(line));
            }
        }
    }

    fn exec_line(&mut self, line: &str) -> CmdResult {
        let result = self.cmds.execute_cmd(&mut self.host, line);
        if let Err(e) = &result {
            warn!(target: "host.cmds", line, error = %e, "command_failed");
            self.host.report(e.to_string());
        }
        result
    }

    fn drain(&mut self) {
        while let Some(work) = self.host.pending.pop_front() {
            match work {
                Pending::Command(line) => {
                    let _ = self.exec_line(&line);
                }
                Pending::Map { mode, lhs, rhs } => {
                    let lhs = parse_key_notation(&lhs);
                    let rhs = parse_key_notation(&rhs);
                    if let Err(e) = self.keys.add_user_keys(&lhs, &rhs, mode.index()) {
                        self.host.report(e.to_string());
                    }
                }
                Pending::Unmap { mode, lhs } => {
                    let lhs = parse_key_notation(&lhs);
                    if let Err(e) = self.keys.remove_user_keys(&lhs, mode.index()) {
                        self.host.report(e.to_string());
                    }
                }
                Pending::ListMaps(mode) => self.list_maps(mode),
                Pending::Complete => self.complete(),
            }
        }
    }

    fn list_maps(&mut self, mode: Mode) {
        let maps = self.keys.list_user_keys(mode.index());
        if maps.is_empty() {
            self.host.report("No mappings found");
            return;
        }
        self.host.output.extend(maps.iter().map(|(lhs, rhs)| {
            format!("{:<10} {}", to_key_notation(lhs), to_key_notation(rhs))
        }));
    }

    fn complete(&mut self) {
        let line = self.host.cmdline.clone();
        let (candidates, offset) = self.cmds.complete_cmd(&mut self.host, &line);
        match candidates.as_slice() {
            [] => self.host.report("No completions"),
            [only] => {
                self.host.cmdline.truncate(offset.min(line.len()));
                self.host.cmdline.push_str(only);
            }
            many => {
                let shown = many.join(" ");
                self.host.report(shown);
            }
        }
    }
}

/// Translates `<CR>`, `<Esc>`, `<Tab>`, `<BS>`, `<Space>` and `<lt>` into the
/// keys they name. Anything else in angle brackets stays literal.
pub fn parse_key_notation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        let named = tail.find('>').and_then(|close| {
            let key = match tail[1..close].to_ascii_lowercase().as_str() {
                "cr" | "enter" | "return" => ENTER,
                "esc" => ESC,
                "tab" => TAB,
                "bs" => BACKSPACE,
                "space" => ' ',
                "lt" => '<',
                _ => return None,
            };
            Some((key, close + 1))
        });
        match named {
            Some((key, len)) => {
                out.push(key);
                rest = &tail[len..];
            }
            None => {
                out.push('<');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Inverse of [`parse_key_notation`] for display.
pub fn to_key_notation(keys: &str) -> String {
    let mut out = String::with_capacity(keys.len());
    for key in keys.chars() {
        match key {
            ENTER => out.push_str("<CR>"),
            ESC => out.push_str("<Esc>"),
            TAB => out.push_str("<Tab>"),
            BACKSPACE => out.push_str("<BS>"),
            '<' => out.push_str("<lt>"),
            other => out.push(other),
        }
    }
    out
}

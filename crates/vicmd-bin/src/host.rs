//! Reference host state: a list of items with a cursor, marks, registers
//! and a selection, plus the queue of work the engines hand back.

use std::collections::{BTreeMap, VecDeque};

use core_cmdline::{CmdHost, CmdId, CmdInfo};
use core_keymap::KeysHost;
use tracing::trace;

use crate::commands;

/// Register used when none is named.
pub const UNNAMED: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal = 0,
    Visual = 1,
    Cmdline = 2,
}

impl Mode {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_config(mode: core_config::MapMode) -> Self {
        match mode {
            core_config::MapMode::Normal => Mode::Normal,
            core_config::MapMode::Visual => Mode::Visual,
            core_config::MapMode::Cmdline => Mode::Cmdline,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Normal => "NORMAL",
            Mode::Visual => "VISUAL",
            Mode::Cmdline => "COMMAND",
        }
    }
}

/// Work that needs the key or command engine itself and so cannot run
/// inside a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    Command(String),
    Map { mode: Mode, lhs: String, rhs: String },
    Unmap { mode: Mode, lhs: String },
    ListMaps(Mode),
    Complete,
}

#[derive(Debug)]
pub struct Host {
    pub items: Vec<String>,
    pub cursor: usize,
    pub marks: BTreeMap<char, usize>,
    pub registers: BTreeMap<char, Vec<String>>,
    /// Inclusive index range picked by `:select` or visual mode.
    pub selection: Option<(usize, usize)>,
    /// Where visual mode started.
    pub anchor: Option<usize>,
    pub mode: Mode,
    pub cmdline: String,
    pub status: String,
    /// Lines produced by listing commands, drained by the front end.
    pub output: Vec<String>,
    pub shell_history: Vec<String>,
    pub pending: VecDeque<Pending>,
    pub quit: bool,
}

impl Host {
    pub fn new(items: Vec<String>) -> Self {
        Self {
            items,
            cursor: 0,
            marks: BTreeMap::new(),
            registers: BTreeMap::new(),
            selection: None,
            anchor: None,
            mode: Mode::Normal,
            cmdline: String::new(),
            status: String::new(),
            output: Vec::new(),
            shell_history: Vec::new(),
            pending: VecDeque::new(),
            quit: false,
        }
    }

    pub fn last(&self) -> usize {
        self.items.len().saturating_sub(1)
    }

    pub fn current_item(&self) -> Option<&str> {
        self.items.get(self.cursor).map(String::as_str)
    }

    pub fn set_cursor(&mut self, idx: usize) {
        self.cursor = idx.min(self.last());
    }

    pub fn enter_mode(&mut self, mode: Mode) {
        trace!(target: "host", from = ?self.mode, to = ?mode, "mode_switch");
        if mode == Mode::Visual {
            self.anchor = Some(self.cursor);
        }
        if self.mode == Mode::Visual && mode != Mode::Visual {
            self.selection = self.visual_range();
            self.anchor = None;
        }
        if mode == Mode::Cmdline {
            self.cmdline.clear();
        }
        self.mode = mode;
    }

    /// Range between the visual anchor and the cursor.
    pub fn visual_range(&self) -> Option<(usize, usize)> {
        self.anchor
            .map(|anchor| (anchor.min(self.cursor), anchor.max(self.cursor)))
    }

    pub fn set_mark(&mut self, mark: char, idx: usize) -> bool {
        if !mark.is_ascii_lowercase() || self.items.is_empty() {
            return false;
        }
        self.marks.insert(mark, idx.min(self.last()));
        true
    }

    pub fn mark(&self, mark: char) -> Option<usize> {
        match mark {
            '<' => self.selection.map(|(begin, _)| begin),
            '>' => self.selection.map(|(_, end)| end),
            _ => self.marks.get(&mark).copied(),
        }
    }

    pub fn yank(&mut self, begin: usize, end: usize, reg: char) -> usize {
        if self.items.is_empty() {
            return 0;
        }
        let end = end.min(self.last());
        let lines = self.items[begin.min(end)..=end].to_vec();
        let count = lines.len();
        self.store(reg, lines);
        count
    }

    /// Removes `begin..=end` into `reg`, dropping marks inside the range
    /// and shifting marks below it.
    pub fn delete(&mut self, begin: usize, end: usize, reg: char) -> usize {
        if self.items.is_empty() || begin > self.last() {
            return 0;
        }
        let end = end.min(self.last());
        let lines: Vec<String> = self.items.drain(begin..=end).collect();
        let count = lines.len();
        self.store(reg, lines);
        self.marks.retain(|_, idx| *idx < begin || *idx > end);
        for idx in self.marks.values_mut() {
            if *idx > end {
                *idx -= count;
            }
        }
        self.selection = None;
        self.set_cursor(begin);
        count
    }

    /// Inserts the contents of `reg` after (or before) `idx`.
    pub fn put(&mut self, reg: char, idx: usize, before: bool) -> Option<usize> {
        let lines = self.registers.get(&reg)?.clone();
        let at = if self.items.is_empty() || before {
            idx.min(self.items.len())
        } else {
            (idx + 1).min(self.items.len())
        };
        let count = lines.len();
        self.items.splice(at..at, lines);
        for mark in self.marks.values_mut() {
            if *mark >= at {
                *mark += count;
            }
        }
        self.cursor = at;
        Some(count)
    }

    fn store(&mut self, reg: char, lines: Vec<String>) {
        if reg != UNNAMED {
            self.registers.insert(UNNAMED, lines.clone());
        }
        self.registers.insert(reg, lines);
    }

    pub fn report(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }
}

impl KeysHost for Host {
    fn mode(&self) -> usize {
        self.mode.index()
    }
}

impl CmdHost for Host {
    fn current_index(&self) -> usize {
        self.cursor
    }

    fn last_index(&self) -> usize {
        self.last()
    }

    fn resolve_mark(&mut self, mark: char) -> Option<usize> {
        self.mark(mark)
    }

    fn swap_range(&mut self) -> bool {
        self.report("Backwards range given, swapped");
        true
    }

    fn expand_macros(&mut self, args: &str, _id: CmdId) -> String {
        let mut out = String::with_capacity(args.len());
        let mut chars = args.chars();
        while let Some(ch) = chars.next() {
            if ch != '%' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                Some('c') => out.push_str(self.current_item().unwrap_or("")),
                Some('n') => out.push_str(&self.items.len().to_string()),
                Some(other) => out.push(other),
                None => out.push('%'),
            }
        }
        out
    }

    fn select_range(&mut self, _id: CmdId, info: &CmdInfo) {
        let range = info
            .range
            .map_or((self.cursor, self.cursor), |r| (r.begin, r.end));
        self.selection = Some(range);
    }

    fn post(&mut self, id: CmdId) {
        if id != commands::SELECT {
            self.selection = None;
        }
    }

    fn complete_args(&mut self, id: CmdId, tail: &str) -> (Vec<String>, usize) {
        let word_start = tail
            .char_indices()
            .rev()
            .find(|(_, ch)| ch.is_whitespace())
            .map_or(0, |(i, ch)| i + ch.len_utf8());
        let word = &tail[word_start..];
        let candidates = match id {
            commands::PUT | commands::DELETE | commands::YANK => self
                .registers
                .keys()
                .map(char::to_string)
                .filter(|reg| reg.starts_with(word))
                .collect(),
            commands::MARKS => self
                .marks
                .keys()
                .map(char::to_string)
                .filter(|m| m.starts_with(word))
                .collect(),
            _ => self
                .items
                .iter()
                .filter(|item| item.starts_with(word))
                .cloned()
                .collect(),
        };
        (candidates, word_start)
    }

    fn substitute_user_args(&mut self, body: &str, info: &CmdInfo) -> String {
        body.replace("%a", &info.args)
    }

    fn list_user_commands(&mut self, commands: &[(String, String)]) {
        if commands.is_empty() {
            self.report("No user-defined commands found");
            return;
        }
        self.output
            .extend(commands.iter().map(|(name, body)| format!("{name:<10} {body}")));
    }
}

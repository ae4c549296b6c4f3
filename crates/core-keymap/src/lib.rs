//! core-keymap: key-chord dispatch engine.
//!
//! Design principles:
//! - One trie per input mode; the host owns the current mode and is asked
//!   for it on every top-level dispatch step.
//! - Pure with respect to time: an incomplete chord is reported as
//!   `KeyOutcome::Wait`/`WaitShort` and the host decides when to retry or
//!   flush via [`Keys::execute_keys_timed_out`].
//! - No process-wide state; several independent `Keys` may coexist.
//! - Logging only at TRACE for traversal steps, DEBUG for outcomes.

mod dispatch;
mod trie;

use bitflags::bitflags;
use thiserror::Error;

pub use dispatch::{DefaultHandler, Keys, KeysHost, MAX_KEY_RECURSION, ModeConf};
pub use trie::{FollowedBy, KeyBinding, KeyCmd, KeyHandler, KeyTrie, NodeKind, SelectorRole};

// -------------------------------------------------------------------------------------------------
// Mode flags
// -------------------------------------------------------------------------------------------------
bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeFlags: u8 {
        /// A leading `"x` selects register `x`.
        const USES_REGS = 0b001;
        /// A leading run of digits is a repeat count.
        const USES_COUNT = 0b010;
        /// The mode also consumes unbound input, so waits must be short.
        const USES_INPUT = 0b100;
    }
}

// -------------------------------------------------------------------------------------------------
// Per-chord and per-dispatch information handed to handlers
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyInfo {
    pub count: Option<u32>,
    pub register: Option<char>,
    /// Parameter captured by a `FollowedBy::Multikey` binding.
    pub multi: Option<char>,
}

impl KeyInfo {
    pub fn count_or(&self, default: u32) -> u32 {
        self.count.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeysInfo {
    /// Set while resolving the target of an operator.
    pub selector: bool,
    /// Indexes chosen by a selector, consumed by the operator.
    pub indexes: Vec<usize>,
    /// Dispatch was forced by a chord timeout.
    pub after_wait: bool,
    /// Keys come from a user mapping rather than typed input.
    pub mapped: bool,
    /// Keys come from a nested dispatch.
    pub recursive: bool,
}

// -------------------------------------------------------------------------------------------------
// Dispatch result
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Nothing matched; the host may fall back to literal handling.
    Unknown,
    /// Valid but incomplete chord.
    Wait,
    /// Valid but incomplete chord in a mode that also takes raw input.
    WaitShort,
    /// Result of the resolved handler; negative values are handler errors.
    Done(i32),
    /// A user mapping re-entered dispatch too deeply.
    RecursionLimit,
}

impl KeyOutcome {
    pub fn is_wait(self) -> bool {
        matches!(self, KeyOutcome::Wait | KeyOutcome::WaitShort)
    }

    pub fn is_ok(self) -> bool {
        matches!(self, KeyOutcome::Done(r) if r >= 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeysError {
    #[error("empty key sequence")]
    EmptySequence,
    #[error("no such mode: {0}")]
    InvalidMode(usize),
    #[error("{0}: cannot remap a built-in key")]
    NativeBinding(String),
    #[error("{0}: no such mapping")]
    NotMapped(String),
}

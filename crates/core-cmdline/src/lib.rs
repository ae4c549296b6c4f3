//! core-cmdline: ex-style command line engine.
//!
//! A line goes through range parsing, name resolution against the sorted
//! registry, tail parsing (bang/query/custom separator), optional macro
//! expansion by the host, tokenization and validation before the handler
//! runs. User-defined commands re-enter the engine on their body text,
//! bounded by a per-descriptor depth counter.
//!
//! Everything that touches the outside world (line indexes, marks, macro
//! expansion, argument completion) goes through [`CmdHost`].

mod args;
mod completion;
mod dispatch;
mod error;
mod info;
mod parser;
mod range;
mod registry;

pub use args::{ArgScanner, split_args};
pub use dispatch::Commands;
pub use error::{CmdError, CmdResult};
pub use info::{CmdInfo, CmdRange};
pub use registry::{CmdBody, CmdDescriptor, CmdHandler, CmdKind};

/// Nested user command executions allowed per descriptor.
pub const MAX_CMD_RECURSION: usize = 16;

/// Descriptor name that installs the user command factory.
pub const USER_CMD_FACTORY: &str = "<USERCMD>";

/// Numeric command identifier chosen by whoever registers the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CmdId(pub i32);

impl CmdId {
    /// Shared by every user-defined command.
    pub const USER: CmdId = CmdId(-1);
    pub const COMMAND: CmdId = CmdId(-2);
    pub const DELCOMMAND: CmdId = CmdId(-3);
}

/// Callbacks the engine needs from the application.
pub trait CmdHost {
    /// Smallest addressable index.
    fn first_index(&self) -> usize {
        0
    }

    fn current_index(&self) -> usize;

    fn last_index(&self) -> usize;

    fn resolve_mark(&mut self, _mark: char) -> Option<usize> {
        None
    }

    /// Whether an inverted range may be swapped instead of rejected.
    fn swap_range(&mut self) -> bool {
        false
    }

    /// Expands macros in raw arguments of commands that ask for it.
    fn expand_macros(&mut self, args: &str, _id: CmdId) -> String {
        args.to_string()
    }

    /// Pre-selects the addressed range for commands that ask for it.
    fn select_range(&mut self, _id: CmdId, _info: &CmdInfo) {}

    /// Fires after every executed command.
    fn post(&mut self, _id: CmdId) {}

    /// Candidates for the argument tail of command `id`, and the offset in
    /// `tail` where the completed token starts.
    fn complete_args(&mut self, _id: CmdId, _tail: &str) -> (Vec<String>, usize) {
        (Vec::new(), 0)
    }

    /// Substitutes invocation arguments into a user command body before it
    /// is executed.
    fn substitute_user_args(&mut self, body: &str, _info: &CmdInfo) -> String {
        body.to_string()
    }

    /// Shows `(name, body)` pairs for a `command` listing.
    fn list_user_commands(&mut self, _commands: &[(String, String)]) {}
}

use thiserror::Error;

/// Why a command line was not executed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CmdError {
    #[error("Invalid command name: {0}")]
    InvalidCommand(String),
    #[error("Invalid range")]
    InvalidRange,
    #[error("No range allowed")]
    NoRangeAllowed,
    #[error("Too few arguments")]
    TooFewArguments,
    #[error("Too many arguments")]
    TooManyArguments,
    #[error("No ! is allowed")]
    NoBangAllowed,
    #[error("Use ! to overwrite a command")]
    BangRequired,
    #[error("No ? is allowed")]
    NoQueryAllowed,
    #[error("Trailing characters")]
    TrailingCharacters,
    #[error("Built-in commands cannot be redefined")]
    NoBuiltinRedefinition,
    #[error("Incorrect command name: {0}")]
    IncorrectName(String),
    #[error("Command recursion is too deep")]
    RecursionLimit,
    #[error("No user-defined command named {0}")]
    UnknownUserCommand(String),
    #[error("Invalid argument (unterminated quote?)")]
    InvalidArguments,
    #[error("Command is already registered: {0}")]
    DuplicateCommand(String),
    #[error("Bad command descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("{0}")]
    Failed(String),
}

/// Handler status on success (0 = done; hosts may use positive codes),
/// or the reason the command failed.
pub type CmdResult = Result<i32, CmdError>;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while routing one input line.
///
/// None of these are fatal to the shell: the router prints the message and
/// the loop carries on.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("syntax error: {0}")]
    Parse(String),

    #[error("{verb}: usage: {verb} <process id>")]
    Usage { verb: &'static str },

    #[error("{verb}: invalid process id: {arg}")]
    InvalidPid { verb: &'static str, arg: String },

    #[error("{verb}: {pid}: no such tracked process")]
    UnknownPid { verb: &'static str, pid: i32 },

    #[error("{verb}: failed to send {signal} to {pid}: {source}")]
    Signal {
        verb: &'static str,
        signal: &'static str,
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("cd: {dir}: {source}")]
    ChangeDir {
        dir: String,
        #[source]
        source: io::Error,
    },

    #[error("cd: {0}")]
    CdUsage(&'static str),

    #[error("pipe failed: {0}")]
    Pipe(#[source] io::Error),

    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),

    #[error("waitpid {pid} failed: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: io::Error,
    },

    #[error("{0}: argument contains a NUL byte")]
    NulByte(String),

    #[error("history: {0}: event not found")]
    EventNotFound(String),

    #[error("history: nested replay of {0} is not expanded")]
    NestedReplay(String),

    #[error("history: {path}: {source}")]
    HistoryIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

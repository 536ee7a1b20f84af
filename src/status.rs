use std::fmt;

/// What a `waitpid` report says happened to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitEvent {
    Exited(i32),
    Signaled(i32),
    Stopped,
    Continued,
}

impl WaitEvent {
    pub fn from_raw(raw_status: libc::c_int) -> Option<Self> {
        if libc::WIFEXITED(raw_status) {
            return Some(Self::Exited(libc::WEXITSTATUS(raw_status)));
        }
        if libc::WIFSIGNALED(raw_status) {
            return Some(Self::Signaled(libc::WTERMSIG(raw_status)));
        }
        if libc::WIFSTOPPED(raw_status) {
            return Some(Self::Stopped);
        }
        if libc::WIFCONTINUED(raw_status) {
            return Some(Self::Continued);
        }
        None
    }

    pub fn is_termination(self) -> bool {
        matches!(self, Self::Exited(_) | Self::Signaled(_))
    }

    /// Shell-style exit code: the exit status, or 128+N when killed by signal N.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(code),
            Self::Signaled(signal) => Some(128 + signal),
            Self::Stopped | Self::Continued => None,
        }
    }
}

impl fmt::Display for WaitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "Done (exit {code})"),
            Self::Signaled(signal) => write!(f, "Killed (signal {signal})"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Continued => f.write_str("Continued"),
        }
    }
}

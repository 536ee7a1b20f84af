use std::io::{self, Write};

use tracing::debug;

use crate::error::ShellError;
use crate::process_table::{ProcState, ProcessTable};
use crate::status::WaitEvent;

// ── Job-control verbs ──

/// A built-in that signals one tracked process by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobVerb {
    /// `alarm <pid>` — continue a suspended process.
    Resume,
    /// `sleep <pid>` — stop a process.
    Suspend,
    /// `blast <pid>` — kill a process.
    Terminate,
}

impl JobVerb {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alarm" => Some(Self::Resume),
            "sleep" => Some(Self::Suspend),
            "blast" => Some(Self::Terminate),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Resume => "alarm",
            Self::Suspend => "sleep",
            Self::Terminate => "blast",
        }
    }

    fn signal(self) -> (libc::c_int, &'static str) {
        match self {
            Self::Resume => (libc::SIGCONT, "SIGCONT"),
            Self::Suspend => (libc::SIGSTOP, "SIGSTOP"),
            Self::Terminate => (libc::SIGKILL, "SIGKILL"),
        }
    }

    /// State the table records once the signal has been delivered.
    fn resulting_state(self) -> ProcState {
        match self {
            Self::Resume => ProcState::Running,
            Self::Suspend => ProcState::Suspended,
            Self::Terminate => ProcState::Terminated,
        }
    }
}

/// Parse a process id argument: a positive decimal integer, digits only.
pub fn parse_pid(verb: JobVerb, arg: &str) -> Result<libc::pid_t, ShellError> {
    let invalid = || ShellError::InvalidPid {
        verb: verb.name(),
        arg: arg.to_string(),
    };
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    match arg.parse::<libc::pid_t>() {
        Ok(pid) if pid > 0 => Ok(pid),
        _ => Err(invalid()),
    }
}

/// Run a job-control verb against the table.
///
/// The table only changes after the kernel accepted the signal; a rejected
/// argument or a failed `kill` leaves every record as it was.
pub fn dispatch(
    verb: JobVerb,
    args: &[String],
    table: &mut ProcessTable,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    let [arg] = args else {
        return Err(ShellError::Usage { verb: verb.name() });
    };
    let pid = parse_pid(verb, arg)?;

    if !table.contains_live(pid) {
        return Err(ShellError::UnknownPid {
            verb: verb.name(),
            pid,
        });
    }

    let (signal, signal_name) = verb.signal();
    send_signal(pid, signal).map_err(|source| ShellError::Signal {
        verb: verb.name(),
        signal: signal_name,
        pid,
        source,
    })?;
    debug!(pid, signal = signal_name, "signal delivered");

    table.set_status(pid, verb.resulting_state());
    let _ = writeln!(stdout, "Sent {signal_name} to process {pid}");
    Ok(())
}

// ── Syscall wrappers ──

/// Deliver `signal` to a single process, retrying on EINTR.
pub(crate) fn send_signal(pid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    if pid <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process id",
        ));
    }

    loop {
        let rc = unsafe { libc::kill(pid, signal) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Block until `pid` exits or stops.
pub(crate) fn wait_for_pid(pid: libc::pid_t) -> io::Result<WaitEvent> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }

        if let Some(event) = WaitEvent::from_raw(raw_status) {
            return Ok(event);
        }
    }
}

/// Non-blocking status check. `Ok(None)` means nothing changed since the
/// last report.
pub(crate) fn poll_pid(pid: libc::pid_t) -> io::Result<Option<WaitEvent>> {
    let mut raw_status: libc::c_int = 0;
    let flags = libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED;

    loop {
        let rc = unsafe { libc::waitpid(pid, &mut raw_status, flags) };
        if rc == 0 {
            return Ok(None);
        }
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            return Err(err);
        }
        return Ok(WaitEvent::from_raw(raw_status));
    }
}

/// Signals the shell itself must not be stopped by while it sits at the prompt.
const SHELL_IGNORED_SIGNALS: [libc::c_int; 3] = [libc::SIGTSTP, libc::SIGTTIN, libc::SIGTTOU];

/// Signals whose default action a freshly forked child gets back before exec.
pub(crate) const CHILD_DEFAULT_SIGNALS: [libc::c_int; 6] = [
    libc::SIGINT,
    libc::SIGQUIT,
    libc::SIGTSTP,
    libc::SIGTTIN,
    libc::SIGTTOU,
    libc::SIGPIPE,
];

pub(crate) fn ignore_stop_signals() -> io::Result<()> {
    for signal in SHELL_IGNORED_SIGNALS {
        let previous = unsafe { libc::signal(signal, libc::SIG_IGN) };
        if previous == libc::SIG_ERR {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

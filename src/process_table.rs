use std::fmt;
use std::io::Write;

use tracing::{debug, warn};

use crate::job_control;
use crate::status::WaitEvent;

/// The lifecycle state of a tracked process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Suspended,
    /// Tombstone: the process is gone or about to be, pending removal.
    Terminated,
}

impl ProcState {
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Terminated)
    }
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "Running",
            Self::Suspended => "Suspended",
            Self::Terminated => "Terminated",
        })
    }
}

/// One child process the launcher created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: libc::pid_t,
    /// The stage as typed, e.g. `sort -r < in.txt`.
    pub command: String,
    pub state: ProcState,
}

/// The shell's process table, in insertion order.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: Vec<ProcessRecord>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly created child as Running.
    pub fn insert(&mut self, pid: libc::pid_t, command: String) {
        debug!(pid, %command, "tracking process");
        self.records.push(ProcessRecord {
            pid,
            command,
            state: ProcState::Running,
        });
    }

    /// Non-blocking poll of every record.
    ///
    /// Children that exited or were killed get a `[pid] Done ...` notice and
    /// are dropped; tombstones are dropped silently once reaped. Stop and
    /// continue reports only move a record between Running and Suspended;
    /// this is on purpose, so a child stopped or continued from outside the
    /// shell is never listed in a state it is not in.
    pub fn refresh(&mut self, stdout: &mut dyn Write) {
        self.records.retain_mut(|record| {
            let event = match job_control::poll_pid(record.pid) {
                Ok(None) => return true,
                Ok(Some(event)) => event,
                Err(e) => {
                    // ECHILD and friends: nothing left to wait for.
                    if record.state.is_live() {
                        warn!(pid = record.pid, error = %e, "status check failed, dropping record");
                        let _ = writeln!(stdout, "[{}]  Done  {}", record.pid, record.command);
                    }
                    return false;
                }
            };

            match event {
                WaitEvent::Stopped if record.state.is_live() => {
                    record.state = ProcState::Suspended;
                    true
                }
                WaitEvent::Continued if record.state.is_live() => {
                    record.state = ProcState::Running;
                    true
                }
                WaitEvent::Stopped | WaitEvent::Continued => true,
                WaitEvent::Exited(_) | WaitEvent::Signaled(_) => {
                    if record.state.is_live() {
                        let _ = writeln!(stdout, "[{}]  {}  {}", record.pid, event, record.command);
                    }
                    record.state = ProcState::Terminated;
                    false
                }
            }
        });
    }

    /// Overwrite the state of the first record with this pid. Unknown pids
    /// are ignored.
    pub fn set_status(&mut self, pid: libc::pid_t, state: ProcState) {
        if let Some(record) = self.records.iter_mut().find(|r| r.pid == pid) {
            record.state = state;
        }
    }

    /// Whether a Running or Suspended record exists for this pid.
    pub fn contains_live(&self, pid: libc::pid_t) -> bool {
        self.records
            .iter()
            .any(|r| r.pid == pid && r.state.is_live())
    }

    #[cfg(test)]
    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Print the table as `procs` shows it.
    pub fn list(&self, stdout: &mut dyn Write) {
        let _ = writeln!(stdout, "{:<8}{:<12}COMMAND", "PID", "STATUS");
        for record in &self.records {
            let _ = writeln!(
                stdout,
                "{:<8}{:<12}{}",
                record.pid,
                record.state.to_string(),
                record.command
            );
        }
    }

    /// Forget every record. Children still running are left to be adopted
    /// by init; nothing is signalled.
    pub fn teardown(&mut self) {
        for record in self.records.drain(..) {
            if record.state.is_live() {
                debug!(pid = record.pid, command = %record.command, "abandoning child");
            }
        }
    }
}

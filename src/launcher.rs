use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};

use tracing::{debug, warn};

use crate::error::ShellError;
use crate::job_control::{self, CHILD_DEFAULT_SIGNALS};
use crate::parser::Command;
use crate::process_table::{ProcState, ProcessTable};
use crate::redirect::Redirections;

/// Everything a child needs to exec one stage, built before `fork`.
struct PreparedStage {
    argv: Vec<CString>,
    /// NULL-terminated pointers into `argv`.
    argv_ptrs: Vec<*const libc::c_char>,
    redirections: Redirections,
    /// `perror` prefix when exec fails, e.g. `jobsh: lss`.
    exec_context: CString,
    display: String,
}

impl PreparedStage {
    fn new(cmd: &Command) -> Result<Self, ShellError> {
        let argv = cmd
            .args
            .iter()
            .map(|arg| to_cstring(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let mut argv_ptrs: Vec<_> = argv.iter().map(|arg| arg.as_ptr()).collect();
        argv_ptrs.push(std::ptr::null());

        Ok(Self {
            argv,
            argv_ptrs,
            redirections: Redirections::prepare(cmd)?,
            exec_context: to_cstring(&format!("jobsh: {}", cmd.program()))?,
            display: cmd.to_string(),
        })
    }
}

/// Which pipe end a pipeline child keeps, and where it goes.
#[derive(Clone, Copy)]
struct PipeWiring {
    unused: RawFd,
    end: RawFd,
    target: RawFd,
}

/// Create the processes for `cmd` (one, or two joined by a pipe) and track
/// them in `table`.
///
/// A single blocking command and every pipeline are waited for before this
/// returns; a non-blocking command is left to the next `refresh`.
pub fn launch(
    cmd: &Command,
    table: &mut ProcessTable,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    match cmd.next.as_deref() {
        None => launch_single(cmd, table, stdout),
        Some(next) => launch_pipeline(cmd, next, table, stdout),
    }
}

fn launch_single(
    cmd: &Command,
    table: &mut ProcessTable,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    let stage = PreparedStage::new(cmd)?;
    let pid = fork()?;
    if pid == 0 {
        exec_stage(&stage, None);
    }

    debug!(pid, command = %stage.display, blocking = cmd.blocking, "launched");
    table.insert(pid, stage.display.clone());

    if cmd.blocking {
        wait_and_record(pid, &stage.display, table, stdout)
    } else {
        let _ = writeln!(stdout, "[{pid}] {}", stage.display);
        Ok(())
    }
}

fn launch_pipeline(
    first: &Command,
    second: &Command,
    table: &mut ProcessTable,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    let producer = PreparedStage::new(first)?;
    let consumer = PreparedStage::new(second)?;
    let (reader, writer) = os_pipe::pipe().map_err(ShellError::Pipe)?;

    let producer_pid = fork()?;
    if producer_pid == 0 {
        exec_stage(
            &producer,
            Some(PipeWiring {
                unused: reader.as_raw_fd(),
                end: writer.as_raw_fd(),
                target: libc::STDOUT_FILENO,
            }),
        );
    }

    let consumer_pid = match fork() {
        Ok(pid) => pid,
        Err(e) => {
            // Nothing from this line is tracked, so take the first stage down too.
            warn!(pid = producer_pid, "second fork failed, killing first stage");
            let _ = job_control::send_signal(producer_pid, libc::SIGKILL);
            let _ = job_control::wait_for_pid(producer_pid);
            return Err(e);
        }
    };
    if consumer_pid == 0 {
        exec_stage(
            &consumer,
            Some(PipeWiring {
                unused: writer.as_raw_fd(),
                end: reader.as_raw_fd(),
                target: libc::STDIN_FILENO,
            }),
        );
    }

    // The consumer only sees EOF once no process holds the write end.
    drop(reader);
    drop(writer);

    debug!(producer_pid, consumer_pid, "launched pipeline");
    table.insert(producer_pid, producer.display.clone());
    table.insert(consumer_pid, consumer.display.clone());

    let first_result = wait_and_record(producer_pid, &producer.display, table, stdout);
    let second_result = wait_and_record(consumer_pid, &consumer.display, table, stdout);
    first_result.and(second_result)
}

/// Blocking wait for one child, then reflect what happened in the table.
fn wait_and_record(
    pid: libc::pid_t,
    display: &str,
    table: &mut ProcessTable,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    match job_control::wait_for_pid(pid) {
        Ok(event) if event.is_termination() => {
            debug!(pid, exit_code = ?event.exit_code(), "foreground child finished");
            table.set_status(pid, ProcState::Terminated);
            Ok(())
        }
        Ok(event) => {
            // Stopped from the terminal; it stays tracked and can be resumed.
            debug!(pid, %event, "foreground child stopped");
            table.set_status(pid, ProcState::Suspended);
            let _ = writeln!(stdout, "[{pid}]  Stopped  {display}");
            Ok(())
        }
        Err(source) => {
            table.set_status(pid, ProcState::Terminated);
            Err(ShellError::Wait { pid, source })
        }
    }
}

fn fork() -> Result<libc::pid_t, ShellError> {
    // Anything still buffered would otherwise be written twice.
    let _ = io::stdout().flush();
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(ShellError::Fork(io::Error::last_os_error()));
    }
    Ok(pid)
}

/// Child side of `fork`: wire up descriptors and exec. Never returns to
/// shell logic.
fn exec_stage(stage: &PreparedStage, pipe: Option<PipeWiring>) -> ! {
    unsafe {
        for signal in CHILD_DEFAULT_SIGNALS {
            libc::signal(signal, libc::SIG_DFL);
        }
        if let Some(wiring) = pipe {
            libc::close(wiring.unused);
        }
    }

    if let Err(path) = stage.redirections.apply() {
        child_fail(path);
    }

    if let Some(wiring) = pipe {
        unsafe {
            if libc::dup2(wiring.end, wiring.target) < 0 {
                child_fail(&stage.exec_context);
            }
            libc::close(wiring.end);
        }
    }

    unsafe {
        libc::execvp(stage.argv[0].as_ptr(), stage.argv_ptrs.as_ptr());
    }
    child_fail(&stage.exec_context)
}

fn child_fail(context: &CStr) -> ! {
    unsafe {
        libc::perror(context.as_ptr());
        libc::_exit(1)
    }
}

fn to_cstring(text: &str) -> Result<CString, ShellError> {
    CString::new(text).map_err(|_| ShellError::NulByte(text.to_string()))
}

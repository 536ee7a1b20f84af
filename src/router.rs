use std::io::Write;

use tracing::debug;

use crate::builtins;
use crate::error::ShellError;
use crate::history::History;
use crate::job_control::{self, JobVerb};
use crate::launcher;
use crate::parser::{self, Command};
use crate::process_table::ProcessTable;

/// How many `!N` expansions one typed line may go through. A replayed line
/// that is itself `!M` is reported instead of expanded.
const MAX_REPLAY_DEPTH: usize = 1;

/// Per-line entry point: owns the process table and talks to the history log.
pub struct Router {
    table: ProcessTable,
    history: Box<dyn History>,
}

impl Router {
    pub fn new(history: Box<dyn History>) -> Self {
        Self {
            table: ProcessTable::new(),
            history,
        }
    }

    #[cfg(test)]
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    /// Handle one raw input line. Returns 0 on success, 1 if an error was
    /// reported on `stderr`.
    pub fn route(&mut self, line: &str, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
        match self.route_line(line, 0, stdout, stderr) {
            Ok(()) => 0,
            Err(e) => {
                let _ = writeln!(stderr, "jobsh: {e}");
                1
            }
        }
    }

    /// Release every tracked record. Still-running children are not signalled.
    pub fn teardown(&mut self) {
        self.table.teardown();
    }

    fn route_line(
        &mut self,
        line: &str,
        depth: usize,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), ShellError> {
        self.table.refresh(stdout);

        // Only the line terminator is dropped; the log keeps the text as typed.
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return Ok(());
        }

        if let Some(event) = line.trim().strip_prefix('!') {
            if depth >= MAX_REPLAY_DEPTH {
                return Err(ShellError::NestedReplay(line.trim().to_string()));
            }
            let replayed = self.resolve_event(event)?;
            debug!(event, %replayed, "replaying history entry");
            let _ = writeln!(stdout, "{replayed}");
            return self.route_line(&replayed, depth + 1, stdout, stderr);
        }

        if let Err(e) = self.history.append(line) {
            let _ = writeln!(stderr, "jobsh: {e}");
        }

        let Some(cmd) = parser::parse(line)? else {
            return Ok(());
        };
        self.dispatch(&cmd, stdout)
    }

    fn dispatch(&mut self, cmd: &Command, stdout: &mut dyn Write) -> Result<(), ShellError> {
        if builtins::is_builtin(cmd.program()) {
            match cmd.program() {
                "cd" => builtins::change_dir(&cmd.args[1..])?,
                "history" => builtins::print_history(&*self.history, stdout),
                _ => self.table.list(stdout),
            }
            return Ok(());
        }

        if let Some(verb) = JobVerb::from_name(cmd.program()) {
            if Self::is_job_control(verb, cmd) {
                return job_control::dispatch(verb, &cmd.args[1..], &mut self.table, stdout);
            }
        }

        launcher::launch(cmd, &mut self.table, stdout)
    }

    /// `alarm` and `blast` are always verbs. `sleep` shares its name with the
    /// program: a blocking `sleep X` with no pipe or redirection is the
    /// suspend verb, so a bad or stale id is reported rather than slept on.
    /// `sleep N &` launches the program.
    fn is_job_control(verb: JobVerb, cmd: &Command) -> bool {
        if verb != JobVerb::Suspend {
            return true;
        }
        cmd.blocking && !cmd.is_pipeline() && !cmd.has_redirection() && cmd.args.len() == 2
    }

    fn resolve_event(&self, event: &str) -> Result<String, ShellError> {
        let not_found = || ShellError::EventNotFound(format!("!{event}"));
        if event.is_empty() || !event.bytes().all(|b| b.is_ascii_digit()) {
            return Err(not_found());
        }
        let n: usize = event.parse().map_err(|_| not_found())?;
        self.history
            .get(n)
            .map(str::to_string)
            .ok_or_else(not_found)
    }
}

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_shell() -> Child {
    Command::new(env!("CARGO_BIN_EXE_jobsh"))
        .arg("--no-history")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .env_remove("RUST_LOG")
        .spawn()
        .expect("spawn jobsh")
}

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = spawn_shell();

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "quit").expect("write quit");
    }

    child.wait_with_output().expect("wait output")
}

/// Drives a shell one line at a time, reading stdout until a marker echo.
struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    fn start() -> Self {
        let mut child = spawn_shell();
        let stdin = child.stdin.take().expect("stdin");
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));
        Session { child, stdin, stdout }
    }

    /// Send `line`, then an `echo` marker, and collect everything printed
    /// before the marker comes back.
    fn send(&mut self, line: &str) -> String {
        writeln!(self.stdin, "{line}").expect("write line");
        writeln!(self.stdin, "echo __DONE__").expect("write marker");

        let mut collected = String::new();
        loop {
            let mut buf = String::new();
            let n = self.stdout.read_line(&mut buf).expect("read stdout");
            assert!(n > 0, "shell closed stdout; got so far: {collected}");
            if buf == "__DONE__\n" {
                return collected;
            }
            collected.push_str(&buf);
        }
    }

    fn quit(mut self) -> std::process::Output {
        writeln!(self.stdin, "quit").expect("write quit");
        drop(self.stdin);
        let mut rest = String::new();
        let _ = std::io::Read::read_to_string(&mut self.stdout, &mut rest);
        let mut output = self.child.wait_with_output().expect("wait output");
        output.stdout = rest.into_bytes();
        output
    }
}

fn status_of(listing: &str, pid: &str) -> Option<String> {
    listing
        .lines()
        .find(|l| l.split_whitespace().next() == Some(pid))
        .and_then(|l| l.split_whitespace().nth(1))
        .map(str::to_string)
}

#[test]
fn suspend_resume_and_kill_a_background_job() {
    let mut shell = Session::start();

    let launched = shell.send("sleep 30 &");
    let pid = launched
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.split(']').next())
        .expect("background launch prints [pid]")
        .to_string();
    assert_eq!(launched, format!("[{pid}] sleep 30\n"));

    let procs = shell.send("procs");
    assert_eq!(status_of(&procs, &pid).as_deref(), Some("Running"), "{procs}");
    assert_eq!(procs, shell.send("procs"), "procs is not idempotent");

    let out = shell.send(&format!("sleep {pid}"));
    assert_eq!(out, format!("Sent SIGSTOP to process {pid}\n"));
    let procs = shell.send("procs");
    assert_eq!(status_of(&procs, &pid).as_deref(), Some("Suspended"), "{procs}");

    let out = shell.send(&format!("alarm {pid}"));
    assert_eq!(out, format!("Sent SIGCONT to process {pid}\n"));
    let procs = shell.send("procs");
    assert_eq!(status_of(&procs, &pid).as_deref(), Some("Running"), "{procs}");

    let out = shell.send(&format!("blast {pid}"));
    assert_eq!(out, format!("Sent SIGKILL to process {pid}\n"));

    // The killed child is reaped by a later refresh and disappears.
    let mut gone = false;
    for _ in 0..50 {
        let procs = shell.send("procs");
        if status_of(&procs, &pid).is_none() {
            gone = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    assert!(gone, "killed job never left the table");

    let output = shell.quit();
    assert!(output.status.success());
}

#[test]
fn finished_background_job_prints_a_notice() {
    let mut shell = Session::start();
    let launched = shell.send("sh -c 'exit 3' &");
    assert!(launched.starts_with('['), "{launched}");

    let mut notices = String::new();
    for _ in 0..50 {
        notices = shell.send("procs");
        if notices.contains("Done") {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    assert!(notices.contains("Done (exit 3)  sh -c exit 3"), "{notices}");
    assert!(notices.ends_with("PID     STATUS      COMMAND\n"), "{notices}");

    shell.quit();
}

#[test]
fn blast_of_untracked_pid_reports_and_changes_nothing() {
    let output = run_shell(&["blast 999999", "procs"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("jobsh: blast: 999999: no such tracked process"), "stderr was: {stderr}");
    assert_eq!(stdout, "PID     STATUS      COMMAND\n");
}

#[test]
fn job_control_arguments_are_validated() {
    let output = run_shell(&["alarm", "blast 1 2", "alarm abc", "blast -3", "echo ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("jobsh: alarm: usage: alarm <process id>"), "stderr was: {stderr}");
    assert!(stderr.contains("jobsh: blast: usage: blast <process id>"), "stderr was: {stderr}");
    assert!(stderr.contains("jobsh: alarm: invalid process id: abc"), "stderr was: {stderr}");
    assert!(stderr.contains("jobsh: blast: invalid process id: -3"), "stderr was: {stderr}");
    assert_eq!(stdout, "ALIVE\n");
}

#[test]
fn blocking_sleep_with_untracked_id_is_reported() {
    let output = run_shell(&["sleep 0", "sleep 999999", "sleep +5", "echo STATUS_OK"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("jobsh: sleep: invalid process id: 0"), "stderr was: {stderr}");
    assert!(stderr.contains("jobsh: sleep: 999999: no such tracked process"), "stderr was: {stderr}");
    assert!(stderr.contains("jobsh: sleep: invalid process id: +5"), "stderr was: {stderr}");
    assert_eq!(stdout, "STATUS_OK\n");
}

#[test]
fn foreground_stop_then_resume_reports_exit() {
    let mut shell = Session::start();
    let out = shell.send("sh -c 'kill -STOP $$; exit 4'");
    let pid = out
        .strip_prefix('[')
        .and_then(|rest| rest.split(']').next())
        .expect("stopped child prints [pid]")
        .to_string();
    assert_eq!(out, format!("[{pid}]  Stopped  sh -c kill -STOP $$; exit 4\n"));

    let procs = shell.send("procs");
    assert_eq!(status_of(&procs, &pid).as_deref(), Some("Suspended"), "{procs}");

    shell.send(&format!("alarm {pid}"));
    let mut notices = String::new();
    for _ in 0..50 {
        notices.push_str(&shell.send("procs"));
        if notices.contains("Done") {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    assert!(notices.contains(&format!("[{pid}]  Done (exit 4)  sh -c")), "{notices}");

    shell.quit();
}

#[test]
fn pipeline_sigpipe_does_not_abort_shell() {
    // `yes` gets SIGPIPE once `head` exits; its default disposition is
    // restored in the child, so it dies instead of spinning on EPIPE.
    let output = run_shell(&["yes | head -1", "echo ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout, "y\nALIVE\n");
    assert!(output.status.success(), "shell did not exit cleanly");
}

#[test]
fn shell_ignores_sigtstp_at_prompt() {
    let output = run_shell(&["sh -c 'kill -TSTP $PPID'", "echo ALIVE"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ALIVE"), "stdout was: {stdout}");
}

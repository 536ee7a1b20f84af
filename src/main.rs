#[cfg(not(unix))]
compile_error!("jobsh forks and signals child processes and only builds on Unix");

mod builtins;
mod config;
mod error;
mod history;
mod job_control;
mod launcher;
mod parser;
mod process_table;
mod redirect;
mod router;
mod status;

use std::io::{self, BufRead, Write};

use crossterm::tty::IsTty;
use tracing::{debug, warn};

use crate::config::{Args, QUIT_SENTINEL};
use crate::history::{FileHistory, History, MemoryHistory};
use crate::router::Router;

fn main() {
    let args: Args = argh::from_env();
    config::init_logging(args.debug);

    if let Err(e) = ctrlc::set_handler(|| {
        println!();
        let _ = io::stdout().flush();
    }) {
        warn!(error = %e, "failed to set Ctrl-C handler");
    }
    if let Err(e) = job_control::ignore_stop_signals() {
        warn!(error = %e, "failed to ignore terminal stop signals");
    }

    let mut router = Router::new(open_history(&args));
    let interactive = io::stdin().is_tty();
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    let mut last_exit_code: i32 = 0;

    loop {
        if interactive {
            print_prompt(&mut stdout);
        }

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => break,
            Ok(_) => {
                if input.trim() == QUIT_SENTINEL {
                    break;
                }
                last_exit_code = router.route(&input, &mut stdout, &mut stderr);
                let _ = stdout.flush();
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                eprintln!("jobsh: error reading input: {e}");
                break;
            }
        }
    }

    router.teardown();
    std::process::exit(last_exit_code);
}

fn open_history(args: &Args) -> Box<dyn History> {
    let Some(path) = args.history_path() else {
        debug!("history kept in memory");
        return Box::new(MemoryHistory::new());
    };

    match FileHistory::open(path) {
        Ok(history) => {
            debug!(path = %history.path().display(), entries = history.entries().len(), "history loaded");
            Box::new(history)
        }
        Err(e) => {
            eprintln!("jobsh: {e}");
            Box::new(MemoryHistory::new())
        }
    }
}

/// The prompt shows the working directory, e.g. `/home/me$ `.
fn print_prompt(stdout: &mut io::Stdout) {
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".to_string());
    let _ = write!(stdout, "{cwd}$ ");
    let _ = stdout.flush();
}

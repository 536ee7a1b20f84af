use std::io;
use std::path::PathBuf;

use argh::FromArgs;
use tracing_subscriber::EnvFilter;

/// Line that ends the interactive loop.
pub const QUIT_SENTINEL: &str = "quit";

const HISTORY_FILE_NAME: &str = ".jobsh_history";

/// An interactive shell that tracks the processes it launches.
#[derive(FromArgs, Debug)]
pub struct Args {
    /// log fork, exec, wait and signal activity to stderr
    #[argh(switch, short = 'd')]
    pub debug: bool,

    /// history file to read and append to (default: $HOME/.jobsh_history)
    #[argh(option)]
    pub history: Option<PathBuf>,

    /// keep history in memory only
    #[argh(switch)]
    pub no_history: bool,
}

impl Args {
    /// Where history is persisted, or `None` for an in-memory log.
    pub fn history_path(&self) -> Option<PathBuf> {
        if self.no_history {
            return None;
        }
        self.history.clone().or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE_NAME))
        })
    }
}

/// Install the stderr log subscriber. `-d` forces debug level; otherwise
/// `RUST_LOG` is honoured, falling back to warnings only.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

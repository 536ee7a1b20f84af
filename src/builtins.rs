use std::io::Write;

use crate::error::ShellError;
use crate::history::History;

/// Built-ins that never spawn a process. Job-control verbs are handled by
/// `job_control::dispatch`.
const BUILTINS: &[&str] = &["cd", "history", "procs"];

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// `cd [dir | -]`. With no argument, go home.
pub fn change_dir(args: &[String]) -> Result<(), ShellError> {
    let target = match args {
        [] => std::env::var("HOME").map_err(|_| ShellError::CdUsage("HOME not set"))?,
        [dir] if dir == "-" => {
            std::env::var("OLDPWD").map_err(|_| ShellError::CdUsage("OLDPWD not set"))?
        }
        [dir] => dir.clone(),
        _ => return Err(ShellError::CdUsage("too many arguments")),
    };

    let previous = std::env::current_dir().ok();
    std::env::set_current_dir(&target).map_err(|source| ShellError::ChangeDir {
        dir: target.clone(),
        source,
    })?;

    // SAFETY: the environment is only mutated from the main thread; the
    // ctrlc handler thread never touches it.
    if let Some(previous) = previous {
        unsafe { std::env::set_var("OLDPWD", previous) };
    }
    Ok(())
}

/// Print the log as numbered rows, oldest first.
pub fn print_history(history: &dyn History, stdout: &mut dyn Write) {
    for (idx, line) in history.entries().iter().enumerate() {
        let _ = writeln!(stdout, "{:>5}  {line}", idx + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;

    #[test]
    fn builtin_names() {
        assert!(is_builtin("cd"));
        assert!(is_builtin("procs"));
        assert!(!is_builtin("ls"));
        assert!(!is_builtin("blast"));
    }

    #[test]
    fn cd_to_missing_directory_keeps_cwd() {
        let before = std::env::current_dir().unwrap();
        let err = change_dir(&["/nonexistent/jobsh/dir".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::ChangeDir { .. }));
        assert!(err.to_string().starts_with("cd: /nonexistent/jobsh/dir: "));
        assert_eq!(std::env::current_dir().unwrap(), before);
    }

    #[test]
    fn cd_rejects_extra_arguments() {
        let err = change_dir(&["a".to_string(), "b".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "cd: too many arguments");
    }

    #[test]
    fn history_rows_are_numbered_from_one() {
        let mut history = MemoryHistory::new();
        history.append("ls -l").unwrap();
        history.append("procs").unwrap();

        let mut out = Vec::new();
        print_history(&history, &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), "    1  ls -l\n    2  procs\n");
    }
}

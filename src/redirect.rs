use std::ffi::{CStr, CString};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::ShellError;
use crate::parser::Command;

/// Redirection targets of one stage, converted to C strings ahead of `fork`
/// so the child never allocates.
#[derive(Debug)]
pub(crate) struct Redirections {
    input: Option<CString>,
    output: Option<CString>,
}

impl Redirections {
    pub(crate) fn prepare(cmd: &Command) -> Result<Self, ShellError> {
        Ok(Self {
            input: cmd.input.as_deref().map(path_to_cstring).transpose()?,
            output: cmd.output.as_deref().map(path_to_cstring).transpose()?,
        })
    }

    /// Reopen stdin/stdout onto the redirect targets. Runs in the child only.
    ///
    /// On failure returns the path that could not be opened, for `perror`.
    pub(crate) fn apply(&self) -> Result<(), &CStr> {
        if let Some(path) = &self.input {
            reopen(path, libc::O_RDONLY, libc::STDIN_FILENO)?;
        }
        if let Some(path) = &self.output {
            reopen(
                path,
                libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                libc::STDOUT_FILENO,
            )?;
        }
        Ok(())
    }
}

fn reopen(path: &CStr, flags: libc::c_int, target: libc::c_int) -> Result<(), &CStr> {
    let fd = unsafe { libc::open(path.as_ptr(), flags | libc::O_CLOEXEC, 0o644 as libc::c_uint) };
    if fd < 0 {
        return Err(path);
    }
    // dup2 clears FD_CLOEXEC on the new descriptor.
    if unsafe { libc::dup2(fd, target) } < 0 {
        return Err(path);
    }
    if fd != target {
        unsafe { libc::close(fd) };
    }
    Ok(())
}

fn path_to_cstring(path: &Path) -> Result<CString, ShellError> {
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| ShellError::NulByte(path.display().to_string()))
}

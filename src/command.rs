use std::os::unix::io::RawFd;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// The three standard streams a command runs against, as raw descriptors.
///
/// The default triple is the shell's own inherited 0/1/2. Redirections and
/// pipelines replace individual slots; the descriptor placed in a slot is
/// owned by whoever opened it (a redirect file, a pipe end), and the triple
/// only borrows it for the duration of one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoTriple {
    /// Descriptor a command reads its input from.
    pub stdin: RawFd,
    /// Descriptor a command writes its output to.
    pub stdout: RawFd,
    /// Descriptor a command writes diagnostics to.
    pub stderr: RawFd,
}

impl Default for IoTriple {
    fn default() -> Self {
        Self {
            stdin: 0,
            stdout: 1,
            stderr: 2,
        }
    }
}

impl IoTriple {
    /// Return a copy of the triple with the slot numbered `slot` replaced.
    ///
    /// Slots other than 0, 1 and 2 leave the triple unchanged; the evaluator
    /// rejects such redirects before building a triple.
    pub fn with_fd(self, slot: i32, fd: RawFd) -> Self {
        match slot {
            0 => Self { stdin: fd, ..self },
            1 => Self { stdout: fd, ..self },
            2 => Self { stderr: fd, ..self },
            _ => self,
        }
    }
}

use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, session-level view of the process environment used by the shell.
///
/// The environment contains:
/// - `vars`: a map of environment variables that will be visible to executed commands.
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: a flag the interactive loop checks to know when to terminate.
/// - `exit_code`: the code the process should terminate with once `should_exit` is set.
/// - `history`: accepted, non-empty input lines, oldest first.
///
/// Note: fields are public for simplicity. The only components that mutate
/// them are the built-ins (`cd`, `exit`) and the interactive loop itself.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// When set to true, indicates that the interactive loop should exit.
    pub should_exit: bool,
    /// Process exit code to use once `should_exit` is set.
    pub exit_code: i32,
    /// Accepted input lines, navigated by the line editor's Up/Down keys.
    pub history: Vec<String>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    ///
    /// This copies variables from `std::env::vars()` and initializes `current_dir`
    /// from `std::env::current_dir()`. The exit flag starts cleared and the
    /// history empty.
    pub fn new() -> Self {
        let mut vars = HashMap::new();
        for (k, v) in stdenv::vars() {
            vars.insert(k, v);
        }
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
            exit_code: 0,
            history: Vec::new(),
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

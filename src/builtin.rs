use crate::command::ExitCode;
use crate::env::Environment;
use crate::external::{self, Resolved};
use anyhow::{anyhow, Context, Result};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Names of every built-in, sorted, shared with `type` and tab completion.
pub const BUILTINS: &[&str] = &["cd", "echo", "exit", "pwd", "type"];

/// Whether `name` names a built-in command.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided IO streams and environment.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error. An `Err` is reported on stderr by the dispatcher and turned
    /// into status 1.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

/// Run the built-in `name` with `args`.
///
/// `name` must be one of [`BUILTINS`]; the evaluator resolves before
/// dispatching here.
pub fn run(
    name: &str,
    args: &[&str],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode> {
    match name {
        "cd" => invoke::<Cd>(args, stdin, stdout, stderr, env),
        "echo" => invoke::<Echo>(args, stdin, stdout, stderr, env),
        "exit" => invoke::<Exit>(args, stdin, stdout, stderr, env),
        "pwd" => invoke::<Pwd>(args, stdin, stdout, stderr, env),
        "type" => invoke::<Type>(args, stdin, stdout, stderr, env),
        other => Err(anyhow!("not a builtin: {}", other)),
    }
}

fn invoke<T: BuiltinCommand>(
    args: &[&str],
    stdin: &mut dyn Read,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
    env: &mut Environment,
) -> Result<ExitCode> {
    match T::from_args(&[T::name()], args) {
        Ok(cmd) => match cmd.execute(stdin, stdout, stderr, env) {
            Ok(code) => Ok(code),
            Err(e) => {
                writeln!(stderr, "{}", e)?;
                Ok(1)
            }
        },
        // argh handles `--help` and malformed flags by producing the usage
        // text instead of a command.
        Err(EarlyExit { output, status }) => {
            if status.is_err() {
                writeln!(stderr, "{}", output.trim_end())?;
                Ok(1)
            } else {
                writeln!(stdout, "{}", output.trim_end())?;
                Ok(0)
            }
        }
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let real = fs::canonicalize(&env.current_dir)
            .with_context(|| format!("pwd: cannot resolve {}", env.current_dir.display()))?;
        writeln!(stdout, "{}", real.display())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// A leading `~` in the target expands to the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        // Without an argument there is nothing to do.
        let Some(raw) = self.target else {
            return Ok(0);
        };

        let expanded = match raw.strip_prefix('~') {
            Some(rest) => {
                let home = env.get_var("HOME").unwrap_or_else(|| ".".to_string());
                format!("{}{}", home, rest)
            }
            None => raw.clone(),
        };

        let target = PathBuf::from(expanded);
        let dest = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let changed = fs::canonicalize(&dest)
            .and_then(|canonical| std::env::set_current_dir(&canonical).map(|_| canonical));
        match changed {
            Ok(canonical) => {
                env.current_dir = canonical;
                Ok(0)
            }
            Err(_) => {
                writeln!(stderr, "cd: {}: No such file or directory", raw)?;
                Ok(1)
            }
        }
    }
}

#[derive(FromArgs)]
/// Leave the shell, optionally with a specific status code.
pub struct Exit {
    #[argh(positional, greedy)]
    /// status code; used when the first argument parses as a number.
    pub args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        env.exit_code = self
            .args
            .first()
            .and_then(|arg| arg.parse().ok())
            .unwrap_or(0);
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _stderr: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Report how each name would be interpreted when used as a command.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut status = 0;
        for name in &self.names {
            match external::resolve(name, env) {
                Some(Resolved::Builtin) => writeln!(stdout, "{} is a shell builtin", name)?,
                Some(Resolved::Executable(path)) => {
                    writeln!(stdout, "{} is {}", name, path.display())?
                }
                None => {
                    writeln!(stderr, "{}: not found", name)?;
                    status = 1;
                }
            }
        }
        Ok(status)
    }
}

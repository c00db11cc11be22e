use crate::builtin;
use crate::command::{ExitCode, IoTriple};
use crate::complete::CompletionConfig;
use crate::editor::{self, ReadError};
use crate::env::Environment;
use crate::external::{self, Resolved};
use crate::io_adapters::{FdReader, FdWriter};
use crate::lexer;
use crate::parser::{self, Ast};
use anyhow::{anyhow, Context, Result};
use nix::fcntl::OFlag;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execve, fork, pipe2, ForkResult, Pid};
use std::ffi::{CStr, CString};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;

const PROMPT: &str = "$ ";

/// The shell: owns the session state and drives the
/// read-scan-parse-execute cycle.
///
/// Example
/// ```
/// use oxsh::Interpreter;
/// let mut sh = Interpreter::default();
/// sh.run_line("echo hello");
/// ```
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    /// Create an interpreter capturing the current process environment.
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// The session's environment, mainly for inspection in tests.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// The interactive Read-Eval-Print Loop.
    ///
    /// Runs until `exit`, end of transmission or a terminal failure, and
    /// returns the code the process should exit with. When standard input
    /// is not a terminal the raw-mode editor is skipped and lines are read
    /// plainly, so piped scripts still execute.
    pub fn repl(&mut self) -> Result<ExitCode> {
        if editor::stdin_is_terminal() {
            self.repl_interactive()
        } else {
            self.repl_batch()
        }
    }

    fn repl_interactive(&mut self) -> Result<ExitCode> {
        loop {
            let completion = CompletionConfig {
                keywords: builtin::BUILTINS,
                path: self.env.get_var("PATH"),
                include_cwd: false,
            };
            let line =
                match editor::read_line_interactive(PROMPT, &self.env.history, completion) {
                    Ok(line) => line,
                    // ^C discards the line being edited and prompts again.
                    Err(ReadError::Interrupted) => continue,
                    // ^D ends the session cleanly.
                    Err(ReadError::Eof) => return Ok(0),
                    Err(ReadError::Io(e)) => return Err(e).context("reading input"),
                };
            if self.feed(&line) {
                return Ok(self.env.exit_code);
            }
        }
    }

    fn repl_batch(&mut self) -> Result<ExitCode> {
        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        loop {
            print!("{}", PROMPT);
            std::io::stdout().flush().context("writing prompt")?;

            let mut line = String::new();
            let n = input.read_line(&mut line).context("reading input")?;
            if n == 0 {
                return Ok(0);
            }
            if self.feed(line.trim_end_matches('\n')) {
                return Ok(self.env.exit_code);
            }
        }
    }

    /// Record and run one accepted line; true when the session should end.
    fn feed(&mut self, line: &str) -> bool {
        if !line.trim().is_empty() {
            self.env.history.push(line.to_string());
            self.run_line(line);
        }
        self.env.should_exit
    }

    /// Scan, parse and execute one line against the shell's own streams.
    ///
    /// Diagnostics (parse errors, failed redirects, unknown commands) go to
    /// stderr; none of them end the session.
    pub fn run_line(&mut self, line: &str) {
        let tokens = lexer::scan(line);
        if tokens.is_empty() {
            return;
        }
        let ast = match parser::parse(tokens) {
            Ok(ast) => ast,
            Err(e) => {
                eprintln!("{}", e);
                return;
            }
        };
        if let Err(e) = self.execute(&ast, IoTriple::default()) {
            eprintln!("{}", e);
        }
    }

    fn execute(&mut self, ast: &Ast, io: IoTriple) -> Result<ExitCode> {
        match ast {
            Ast::Command { argv } => self.run_command(argv, io),
            Ast::Redirect {
                inner,
                fd,
                target,
                append,
            } => {
                let file = open_redirect_target(*fd, target, *append)?;
                let code = self.execute(inner, io.with_fd(*fd, file.as_raw_fd()));
                // The file closes here, after the inner node has run and
                // any child has inherited the descriptor.
                drop(file);
                code
            }
            Ast::Pipeline(stages) => self.run_pipeline(stages, io),
        }
    }

    fn run_command(&mut self, argv: &[String], io: IoTriple) -> Result<ExitCode> {
        let name = &argv[0];
        match external::resolve(name, &self.env) {
            None => {
                // Unknown commands are reported, not fatal.
                writeln!(FdWriter(io.stderr), "{}: command not found", name)?;
                Ok(0)
            }
            Some(Resolved::Builtin) => self.run_builtin(argv, io),
            Some(Resolved::Executable(path)) => {
                let pid = spawn_external(&path, argv, &self.env, io)?;
                wait_for(pid)
            }
        }
    }

    fn run_builtin(&mut self, argv: &[String], io: IoTriple) -> Result<ExitCode> {
        let args: Vec<&str> = argv[1..].iter().map(String::as_str).collect();
        builtin::run(
            &argv[0],
            &args,
            &mut FdReader(io.stdin),
            &mut FdWriter(io.stdout),
            &mut FdWriter(io.stderr),
            &mut self.env,
        )
    }

    /// Run a pipeline: one pipe per adjacent stage pair, one child process
    /// per stage. The parent closes each pipe end as soon as its consumer
    /// has been spawned, then reaps every stage; the pipeline's status is
    /// the last stage's.
    fn run_pipeline(&mut self, stages: &[Ast], io: IoTriple) -> Result<ExitCode> {
        let mut pipes: Vec<(RawFd, RawFd)> = Vec::with_capacity(stages.len() - 1);
        for _ in 1..stages.len() {
            match pipe2(OFlag::O_CLOEXEC) {
                Ok(pair) => pipes.push(pair),
                Err(e) => {
                    close_all(&mut pipes);
                    return Err(e).context("cannot create pipe");
                }
            }
        }

        let mut children = Vec::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            let stage_io = IoTriple {
                stdin: if i > 0 { pipes[i - 1].0 } else { io.stdin },
                stdout: if i + 1 < stages.len() {
                    pipes[i].1
                } else {
                    io.stdout
                },
                stderr: io.stderr,
            };
            match self.launch_stage(stage, stage_io) {
                Ok(pid) => children.push(pid),
                Err(e) => {
                    close_all(&mut pipes);
                    for pid in children {
                        let _ = waitpid(pid, None);
                    }
                    return Err(e);
                }
            }
            // Both ends wired to the child just spawned are the parent's to
            // close now.
            if i > 0 {
                close_end(&mut pipes[i - 1].0);
            }
            if i + 1 < stages.len() {
                close_end(&mut pipes[i].1);
            }
        }

        let mut last = Ok(0);
        for pid in children {
            last = wait_for(pid);
        }
        last
    }

    /// Launch one pipeline stage as a child process and return its pid.
    ///
    /// Built-ins also fork here: a stage must run concurrently with its
    /// neighbours to stream through the pipe. `cd` and `exit` inside a
    /// pipeline only affect the stage's own process.
    fn launch_stage(&mut self, stage: &Ast, io: IoTriple) -> Result<Pid> {
        match stage {
            Ast::Command { argv } => {
                let name = &argv[0];
                match external::resolve(name, &self.env) {
                    Some(Resolved::Executable(path)) => {
                        spawn_external(&path, argv, &self.env, io)
                    }
                    Some(Resolved::Builtin) => {
                        match unsafe { fork() }.context("fork failed")? {
                            ForkResult::Child => {
                                let code = self.run_builtin(argv, io).unwrap_or(1);
                                std::process::exit(code);
                            }
                            ForkResult::Parent { child } => Ok(child),
                        }
                    }
                    None => match unsafe { fork() }.context("fork failed")? {
                        ForkResult::Child => {
                            let _ =
                                writeln!(FdWriter(io.stderr), "{}: command not found", name);
                            std::process::exit(0);
                        }
                        ForkResult::Parent { child } => Ok(child),
                    },
                }
            }
            Ast::Redirect {
                inner,
                fd,
                target,
                append,
            } => {
                let file = open_redirect_target(*fd, target, *append)?;
                // The child inherits the descriptor during spawn; the
                // parent's copy closes when `file` drops.
                self.launch_stage(inner, io.with_fd(*fd, file.as_raw_fd()))
            }
            // The grammar nests pipelines only under the root.
            Ast::Pipeline(_) => Err(anyhow!("nested pipelines are not supported")),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the file a redirect points at.
///
/// Descriptor 0 opens the target read-only; 1 and 2 create the target and
/// either truncate or append. Anything else is not a supported redirect.
fn open_redirect_target(fd: i32, target: &str, append: bool) -> Result<File> {
    match fd {
        0 => File::open(target).with_context(|| format!("cannot open {}", target)),
        1 | 2 => {
            let mut opts = OpenOptions::new();
            opts.write(true).create(true);
            if append {
                opts.append(true);
            } else {
                opts.truncate(true);
            }
            opts.open(target)
                .with_context(|| format!("cannot open {}", target))
        }
        other => Err(anyhow!("unsupported redirect: fd {}", other)),
    }
}

/// Fork and exec an external program with the given streams.
fn spawn_external(path: &Path, argv: &[String], env: &Environment, io: IoTriple) -> Result<Pid> {
    let prog = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("bad program path {}", path.display()))?;
    let args: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<_, _>>()
        .context("argument contains a NUL byte")?;
    let envp: Vec<CString> = env
        .vars
        .iter()
        .filter_map(|(k, v)| CString::new(format!("{}={}", k, v)).ok())
        .collect();

    match unsafe { fork() }.context("fork failed")? {
        ForkResult::Child => {
            let code = exec_child(&prog, &args, &envp, io);
            std::process::exit(code);
        }
        ForkResult::Parent { child } => Ok(child),
    }
}

/// Child-side half of the spawn: rewire 0/1/2 and exec. Returns only on
/// failure, with the code the child should exit with.
fn exec_child(prog: &CStr, args: &[CString], envp: &[CString], io: IoTriple) -> i32 {
    if redirect_stdio(io).is_err() {
        return 126;
    }
    let _ = execve(prog, args, envp);
    127
}

fn redirect_stdio(io: IoTriple) -> nix::Result<()> {
    if io.stdin != 0 {
        dup2(io.stdin, 0)?;
    }
    if io.stdout != 1 {
        dup2(io.stdout, 1)?;
    }
    if io.stderr != 2 {
        dup2(io.stderr, 2)?;
    }
    Ok(())
}

fn wait_for(pid: Pid) -> Result<ExitCode> {
    loop {
        match waitpid(pid, None).context("waitpid failed")? {
            WaitStatus::Exited(_, code) => return Ok(code),
            WaitStatus::Signaled(_, signal, _) => return Ok(128 + signal as i32),
            _ => continue,
        }
    }
}

fn close_end(fd: &mut RawFd) {
    if *fd >= 0 {
        let _ = close(*fd);
        *fd = -1;
    }
}

fn close_all(pipes: &mut [(RawFd, RawFd)]) {
    for (r, w) in pipes {
        close_end(r);
        close_end(w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_unique_temp_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let p = std::env::temp_dir().join(format!(
            "interp_tests_{}_{}_{}",
            tag,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    /// Execute one line with stdout and stderr captured into files.
    fn run_captured(interp: &mut Interpreter, line: &str, dir: &Path) -> (ExitCode, String, String) {
        let out_path = dir.join("stdout.capture");
        let err_path = dir.join("stderr.capture");
        let out = File::create(&out_path).unwrap();
        let err = File::create(&err_path).unwrap();
        let io = IoTriple {
            stdin: 0,
            stdout: out.as_raw_fd(),
            stderr: err.as_raw_fd(),
        };
        let ast = parser::parse(scan(line)).expect("parse");
        let code = interp.execute(&ast, io).expect("execute");
        drop(out);
        drop(err);
        (
            code,
            fs::read_to_string(out_path).unwrap(),
            fs::read_to_string(err_path).unwrap(),
        )
    }

    #[test]
    fn builtin_writes_through_the_triple() {
        let dir = make_unique_temp_dir("echo");
        let mut interp = Interpreter::new();
        let (code, out, err) = run_captured(&mut interp, "echo hello world", &dir);
        assert_eq!(code, 0);
        assert_eq!(out, "hello world\n");
        assert!(err.is_empty());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_commands_are_non_fatal() {
        let dir = make_unique_temp_dir("unknown");
        let mut interp = Interpreter::new();
        let (code, out, err) = run_captured(&mut interp, "no-such-command-xyz", &dir);
        assert_eq!(code, 0);
        assert!(out.is_empty());
        assert_eq!(err, "no-such-command-xyz: command not found\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn redirect_truncates_and_writes_the_target() {
        let dir = make_unique_temp_dir("redir");
        let target = dir.join("out.txt");
        let mut interp = Interpreter::new();
        let line = format!("echo 'a | b' > {}", target.display());
        let (code, _, _) = run_captured(&mut interp, &line, &dir);
        assert_eq!(code, 0);
        assert_eq!(fs::read_to_string(&target).unwrap(), "a | b\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn append_redirect_accumulates() {
        let dir = make_unique_temp_dir("append");
        let target = dir.join("log");
        let mut interp = Interpreter::new();
        let line = format!("echo one >> {}", target.display());
        run_captured(&mut interp, &line, &dir);
        run_captured(&mut interp, &line, &dir);
        assert_eq!(fs::read_to_string(&target).unwrap(), "one\none\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn stderr_redirect_captures_diagnostics() {
        let dir = make_unique_temp_dir("stderr");
        let target = dir.join("err.txt");
        let mut interp = Interpreter::new();
        let line = format!("type nosuchthing 2> {}", target.display());
        let (code, _, err) = run_captured(&mut interp, &line, &dir);
        assert_eq!(code, 1);
        assert!(err.is_empty());
        assert_eq!(
            fs::read_to_string(&target).unwrap(),
            "nosuchthing: not found\n"
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn descriptor_zero_redirect_feeds_stdin() {
        let dir = make_unique_temp_dir("stdin");
        let source = dir.join("in.txt");
        fs::write(&source, "from the file\n").unwrap();
        let mut interp = Interpreter::new();
        let line = format!("cat 0> {}", source.display());
        let (code, out, _) = run_captured(&mut interp, &line, &dir);
        assert_eq!(code, 0);
        assert_eq!(out, "from the file\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unsupported_descriptors_are_rejected() {
        let dir = make_unique_temp_dir("badfd");
        let mut interp = Interpreter::new();
        let ast = parser::parse(scan("echo x 3> somewhere")).unwrap();
        let err = interp.execute(&ast, IoTriple::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported redirect: fd 3"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn failed_redirect_abandons_the_line() {
        let dir = make_unique_temp_dir("badpath");
        let mut interp = Interpreter::new();
        let line = format!("echo x > {}/no/such/dir/file", dir.display());
        let ast = parser::parse(scan(&line)).unwrap();
        assert!(interp.execute(&ast, IoTriple::default()).is_err());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn external_commands_report_their_exit_code() {
        let dir = make_unique_temp_dir("status");
        let mut interp = Interpreter::new();
        let (code, _, _) = run_captured(&mut interp, "sh -c 'exit 7'", &dir);
        assert_eq!(code, 7);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn pipeline_connects_builtin_to_external() {
        let dir = make_unique_temp_dir("pipe");
        let mut interp = Interpreter::new();
        let (code, out, _) = run_captured(&mut interp, "echo through a pipe | cat", &dir);
        assert_eq!(code, 0);
        assert_eq!(out, "through a pipe\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn pipeline_counts_lines() {
        let dir = make_unique_temp_dir("wc");
        let mut interp = Interpreter::new();
        let (code, out, _) = run_captured(&mut interp, "echo -n 'a\nb\nc\n' | wc -l", &dir);
        assert_eq!(code, 0);
        assert_eq!(out.trim(), "3");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn pipeline_status_is_the_last_stage() {
        let dir = make_unique_temp_dir("last");
        let mut interp = Interpreter::new();
        let (code, _, _) = run_captured(&mut interp, "sh -c 'exit 3' | sh -c 'exit 5'", &dir);
        assert_eq!(code, 5);
        let (code, _, _) = run_captured(&mut interp, "sh -c 'exit 3' | sh -c 'exit 0'", &dir);
        assert_eq!(code, 0);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_stage_in_a_pipeline_does_not_break_the_rest() {
        let dir = make_unique_temp_dir("pipeunknown");
        let mut interp = Interpreter::new();
        let (code, out, err) =
            run_captured(&mut interp, "no-such-cmd-abc | echo still here", &dir);
        assert_eq!(code, 0);
        assert_eq!(out, "still here\n");
        assert_eq!(err, "no-such-cmd-abc: command not found\n");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn exit_builtin_flags_the_session() {
        let mut interp = Interpreter::new();
        interp.run_line("exit 5");
        assert!(interp.env().should_exit);
        assert_eq!(interp.env().exit_code, 5);
    }

    #[test]
    fn exit_inside_a_pipeline_does_not_end_the_session() {
        let dir = make_unique_temp_dir("pipexit");
        let mut interp = Interpreter::new();
        run_captured(&mut interp, "exit 9 | cat", &dir);
        assert!(!interp.env().should_exit);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn feed_records_history_and_skips_blanks() {
        let mut interp = Interpreter::new();
        assert!(!interp.feed("echo -n"));
        assert!(!interp.feed("   "));
        assert!(!interp.feed(""));
        assert_eq!(interp.env().history, vec!["echo -n".to_string()]);
    }
}

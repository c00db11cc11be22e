use oxsh::Interpreter;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut shell = Interpreter::default();
    match shell.repl() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("oxsh: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

use crate::builtin;
use crate::env::Environment;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// How a command name resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The name is one of the shell's built-in commands.
    Builtin,
    /// The name is an executable program; the payload is its full path.
    Executable(PathBuf),
}

/// Resolve a command name the way a typical shell would.
///
/// Built-in names win. A name containing a path separator is probed
/// directly, so `./script` and `/bin/ls` work without a `PATH` entry. Any
/// other name is searched for in each `PATH` directory in order; the first
/// entry that is a regular file with any of the executable mode bits set is
/// the result. Unreadable directories are skipped silently. When `PATH` is
/// unset, only built-ins resolve.
pub fn resolve(name: &str, env: &Environment) -> Option<Resolved> {
    if builtin::is_builtin(name) {
        return Some(Resolved::Builtin);
    }

    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(Resolved::Executable(path));
    }

    let search_paths = env.get_var("PATH")?;
    find_in_path(OsStr::new(&search_paths), name).map(Resolved::Executable)
}

fn find_in_path(search_paths: &OsStr, name: &str) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// A path is runnable when it names a regular file with any of the three
/// executable permission bits set.
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

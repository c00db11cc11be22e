use crate::external;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;

/// Where completion candidates come from.
///
/// The sources are fixed: the built-in keyword list, the executables found
/// in the colon-separated `path` value, and optionally the current working
/// directory under the same executable filter.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Names always offered (the shell's built-ins).
    pub keywords: &'static [&'static str],
    /// The `PATH` value to scan, if set.
    pub path: Option<String>,
    /// Also offer executables from the current working directory.
    pub include_cwd: bool,
}

/// Collect every candidate that starts with `input`, deduplicated and
/// sorted lexicographically.
///
/// Directories that cannot be opened or iterated are skipped; completion
/// never fails, it only comes back empty.
pub fn complete(input: &str, config: &CompletionConfig) -> Vec<String> {
    let mut candidates = BTreeSet::new();

    for keyword in config.keywords {
        if keyword.starts_with(input) {
            candidates.insert(keyword.to_string());
        }
    }

    if let Some(search_paths) = &config.path {
        for dir in std::env::split_paths(OsStr::new(search_paths)) {
            collect_executables(&dir, input, &mut candidates);
        }
    }

    if config.include_cwd {
        collect_executables(Path::new("."), input, &mut candidates);
    }

    candidates.into_iter().collect()
}

fn collect_executables(dir: &Path, input: &str, out: &mut BTreeSet<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(input) && external::is_executable(&entry.path()) {
            out.insert(name.to_string());
        }
    }
}

/// The longest byte prefix shared by all items.
///
/// Meaningful only for a non-empty slice; an empty slice yields the empty
/// string.
pub fn longest_common_prefix<S: AsRef<str>>(items: &[S]) -> String {
    let Some(first) = items.first() else {
        return String::new();
    };
    let mut prefix = first.as_ref().to_string();
    for item in &items[1..] {
        let item = item.as_ref();
        while !item.starts_with(&prefix) {
            prefix.pop();
        }
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

//! # browser-locate
//!
//! Find an installed Chrome / Chromium executable so headless rendering can
//! start without the caller hard-coding a platform-specific path.
//!
//! ## How it works
//!
//! [`locate_browser`] resolves, first match wins:
//!
//! 1. An explicit path handed in by the caller (CLI flag, config file).
//! 2. `CHROME_PATH`, then `CHROMIUM_PATH`.
//! 3. Well-known install locations for the current platform.
//! 4. A `PATH` search for `chromium`, `chromium-browser`, `google-chrome`,
//!    `google-chrome-stable` and `chrome`.
//!
//! ## Why fail instead of guessing?
//!
//! An explicit path or environment override that points at nothing is almost
//! always a typo. Silently falling back to another browser would render with a
//! binary the user did not ask for, so both cases are reported as errors
//! rather than skipped. Only when nothing was requested do we walk the
//! candidate list, and when that comes up empty the error lists everything
//! that was checked.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use browser_locate::locate_browser;
//!
//! match locate_browser(None) {
//!     Ok(path) => println!("rendering with {}", path.display()),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Environment variables consulted (in order) before any filesystem search.
pub const ENV_OVERRIDES: &[&str] = &["CHROME_PATH", "CHROMIUM_PATH"];

/// Executable names searched on `PATH`.
pub const BROWSER_NAMES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by browser discovery.
#[derive(Error, Debug)]
pub enum LocateError {
    /// The caller named a browser executable that does not exist.
    #[error("Browser executable not found at '{path}'")]
    ExplicitPathMissing { path: PathBuf },

    /// An override environment variable points at a missing file.
    #[error("{var} is set to '{path}' but no file exists there")]
    EnvPathMissing { var: &'static str, path: PathBuf },

    /// Nothing was requested and no candidate location holds a browser.
    #[error(
        "No Chrome/Chromium installation found ({searched} locations checked).\n\
Install Chromium or Google Chrome, or set CHROME_PATH=/path/to/chrome."
    )]
    NotFound { searched: usize },
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Resolve the browser executable to launch.
///
/// `explicit` wins over everything else; see the crate docs for the full
/// order.
pub fn locate_browser(explicit: Option<&Path>) -> Result<PathBuf, LocateError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(LocateError::ExplicitPathMissing {
                path: path.to_path_buf(),
            })
        };
    }

    for &var in ENV_OVERRIDES {
        if let Some(value) = std::env::var_os(var).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(value);
            return if path.is_file() {
                Ok(path)
            } else {
                Err(LocateError::EnvPathMissing { var, path })
            };
        }
    }

    let candidates = candidate_paths();
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    let path_var = std::env::var_os("PATH").unwrap_or_default();
    if let Some(found) = search_path(BROWSER_NAMES, &path_var) {
        return Ok(found);
    }

    let path_dirs = std::env::split_paths(&path_var).count();
    Err(LocateError::NotFound {
        searched: candidates.len() + path_dirs * BROWSER_NAMES.len(),
    })
}

/// Well-known install locations for the current platform, `~` expanded.
pub fn candidate_paths() -> Vec<PathBuf> {
    let raw: &[&str] = if cfg!(target_os = "windows") {
        &[
            r"%PROGRAMFILES%\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES(X86)%\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES%\Chromium\Application\chrome.exe",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "~/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    raw.iter().filter_map(|p| expand(p)).collect()
}

/// Search each directory of a `PATH`-style value for the first executable
/// matching one of `names` (tried in order of `names`, then directories).
pub fn search_path(names: &[&str], path_var: &OsStr) -> Option<PathBuf> {
    let dirs: Vec<PathBuf> = std::env::split_paths(path_var).collect();
    for name in names {
        for dir in &dirs {
            let candidate = dir.join(exe_name(name));
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn exe_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Expand a leading `~/` and any `%VAR%` tokens. Returns `None` when a
/// referenced variable or the home directory is unavailable.
fn expand(raw: &str) -> Option<PathBuf> {
    if let Some(rest) = raw.strip_prefix("~/") {
        return dirs::home_dir().map(|home| home.join(rest));
    }
    if !raw.contains('%') {
        return Some(PathBuf::from(raw));
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('%')?;
        let value = std::env::var(&after[..end]).ok()?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(PathBuf::from(out))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = locate_browser(Some(Path::new("/definitely/not/here/chrome"))).unwrap_err();
        assert!(matches!(err, LocateError::ExplicitPathMissing { .. }));
        assert!(err.to_string().contains("/definitely/not/here/chrome"));
    }

    #[test]
    fn explicit_existing_path_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("my-chrome");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        assert_eq!(locate_browser(Some(&exe)).unwrap(), exe);
    }

    #[test]
    fn candidate_paths_are_absolute() {
        let paths = candidate_paths();
        assert!(!paths.is_empty());
        for p in paths {
            assert!(!p.to_string_lossy().starts_with('~'), "unexpanded: {p:?}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn search_path_finds_first_executable_name() {
        use std::os::unix::fs::PermissionsExt;

        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();

        // Not executable: must be skipped.
        let plain = a.path().join("chromium");
        std::fs::write(&plain, b"").unwrap();

        let exe = b.path().join("google-chrome");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path_var = std::env::join_paths([a.path(), b.path()]).unwrap();
        let found = search_path(BROWSER_NAMES, &path_var).unwrap();
        assert_eq!(found, exe);
    }

    #[test]
    fn search_path_empty_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();
        assert!(search_path(BROWSER_NAMES, &path_var).is_none());
    }

    #[test]
    fn expand_leaves_plain_paths_alone() {
        assert_eq!(expand("/usr/bin/chromium"), Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn expand_missing_variable_yields_none() {
        assert_eq!(expand(r"%BROWSER_LOCATE_UNSET_VAR_XYZ%\chrome.exe"), None);
    }

    #[test]
    fn not_found_message_has_hint() {
        let msg = LocateError::NotFound { searched: 12 }.to_string();
        assert!(msg.contains("12 locations"));
        assert!(msg.contains("CHROME_PATH"));
    }
}

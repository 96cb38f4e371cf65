//! Scoped environment lookup.
//!
//! The endpoint variable is looked up at three scopes, narrowest first:
//!
//! | Scope | [`SystemEnvironment`] source |
//! |-------|------------------------------|
//! | Process | process environment |
//! | User | `<config dir>/environment.d/*.conf` |
//! | Machine | `/etc/environment` |

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::trace;

// ============================================================================
// EnvScope
// ============================================================================

/// Scope at which an environment variable is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvScope {
    /// The running process.
    Process,
    /// The current user.
    User,
    /// The whole machine.
    Machine,
}

impl EnvScope {
    /// Lookup order.
    pub const ALL: [Self; 3] = [Self::Process, Self::User, Self::Machine];
}

impl fmt::Display for EnvScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Process => "process",
            Self::User => "user",
            Self::Machine => "machine",
        })
    }
}

// ============================================================================
// EnvironmentSource
// ============================================================================

/// Source of scoped environment values.
pub trait EnvironmentSource: Send + Sync + 'static {
    /// Returns the value of `key` at `scope`, if set.
    fn var(&self, scope: EnvScope, key: &str) -> Option<String>;
}

// ============================================================================
// SystemEnvironment
// ============================================================================

/// Reads the real process environment and the user/machine env files.
#[derive(Debug, Clone)]
pub struct SystemEnvironment {
    user_dir: Option<PathBuf>,
    machine_file: PathBuf,
}

impl Default for SystemEnvironment {
    fn default() -> Self {
        Self {
            user_dir: dirs::config_dir().map(|dir| dir.join("environment.d")),
            machine_file: PathBuf::from("/etc/environment"),
        }
    }
}

impl SystemEnvironment {
    /// Creates a source reading the standard locations.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the user-scope directory.
    #[inline]
    #[must_use]
    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self
    }

    /// Overrides the machine-scope file.
    #[inline]
    #[must_use]
    pub fn with_machine_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.machine_file = path.into();
        self
    }

    /// Scans `*.conf` in `dir` by file name; later files win.
    fn user_var(dir: &Path, key: &str) -> Option<String> {
        let entries = fs::read_dir(dir)
            .inspect_err(|e| trace!(dir = %dir.display(), error = %e, "No user environment dir"))
            .ok()?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "conf"))
            .collect();
        files.sort();

        files
            .iter()
            .filter_map(|path| fs::read_to_string(path).ok())
            .filter_map(|contents| parse_env_file(&contents, key))
            .last()
    }

    fn machine_var(path: &Path, key: &str) -> Option<String> {
        let contents = fs::read_to_string(path)
            .inspect_err(|e| trace!(path = %path.display(), error = %e, "No machine environment file"))
            .ok()?;
        parse_env_file(&contents, key)
    }
}

impl EnvironmentSource for SystemEnvironment {
    fn var(&self, scope: EnvScope, key: &str) -> Option<String> {
        match scope {
            EnvScope::Process => std::env::var(key).ok(),
            EnvScope::User => self
                .user_dir
                .as_deref()
                .and_then(|dir| Self::user_var(dir, key)),
            EnvScope::Machine => Self::machine_var(&self.machine_file, key),
        }
    }
}

// ============================================================================
// StaticEnvironment
// ============================================================================

/// In-memory environment, for hosts that manage configuration themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    values: HashMap<(EnvScope, String), String>,
}

impl StaticEnvironment {
    /// Creates an empty environment.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` at `scope`.
    #[must_use]
    pub fn with(mut self, scope: EnvScope, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert((scope, key.into()), value.into());
        self
    }
}

impl EnvironmentSource for StaticEnvironment {
    fn var(&self, scope: EnvScope, key: &str) -> Option<String> {
        self.values.get(&(scope, key.to_string())).cloned()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses `KEY=VALUE` lines and returns the last value for `key`.
///
/// Blank lines, `#` comments and an `export ` prefix are accepted. Matching
/// single or double quotes around the value are stripped.
#[must_use]
pub fn parse_env_file(contents: &str, key: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (k, v) = line.split_once('=')?;
            (k.trim() == key).then(|| unquote(v.trim()).to_string())
        })
        .last()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

// ============================================================================
// Tests
// ============================================================================

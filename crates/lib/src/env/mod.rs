//! Environment configuration
//!
//! A switch cannot change the environment of the shell that invoked it, so
//! the variables that make an isolated key effective are written to a file
//! the user's shell sources. The configurator owns that file.

pub mod errors;
pub mod file;
pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

pub use errors::EnvError;
pub use file::EnvFile;
pub use memory::MemoryEnvironment;

use crate::Result;

/// Variable name to value, rendered in name order.
pub type EnvVars = BTreeMap<String, String>;

/// Owns the exported variables for the active identity.
#[async_trait]
pub trait EnvironmentConfigurator: Send + Sync {
    /// Current exports, `None` if nothing has been written.
    async fn read(&self) -> Result<Option<EnvVars>>;

    /// Replace the exports. `None` removes them entirely.
    async fn write(&self, vars: Option<&EnvVars>) -> Result<()>;
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote `value` for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Render `vars` as `export NAME='value'` lines.
pub fn render_exports(vars: &EnvVars) -> std::result::Result<String, EnvError> {
    let mut out = String::from("# Managed by gitswitch; changes are overwritten on switch.\n");
    for (name, value) in vars {
        if !valid_name(name) {
            return Err(EnvError::InvalidName { name: name.clone() });
        }
        if value.contains(['\n', '\r']) {
            return Err(EnvError::MultilineValue { name: name.clone() });
        }
        out.push_str(&format!("export {name}={}\n", shell_quote(value)));
    }
    Ok(out)
}

/// Parse output of [`render_exports`]. Returns the 1-based number of the
/// first line that is not an export.
pub fn parse_exports(contents: &str) -> std::result::Result<EnvVars, usize> {
    let mut vars = EnvVars::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, quoted) = line
            .strip_prefix("export ")
            .and_then(|rest| rest.split_once('='))
            .ok_or(idx + 1)?;
        let value = unquote(quoted).ok_or(idx + 1)?;
        vars.insert(name.to_string(), value);
    }
    Ok(vars)
}

fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
    let value = inner.replace(r"'\''", "'");
    // Any other bare quote means the line was not produced by shell_quote.
    (!inner.replace(r"'\''", "").contains('\'')).then_some(value)
}

//! Human-readable summary of the resolved ltex-ls.

use std::fmt;
use std::path::Path;

use crate::dependency::ResolvedDependency;

const NOT_AVAILABLE: &str = "n/a";

/// Versions and paths in use, for logs and `--status` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub host_version: String,
    pub ltex_ls_path: Option<String>,
    pub ltex_ls_version: Option<String>,
    pub java_path: Option<String>,
    pub java_version: Option<String>,
}

impl StatusReport {
    pub fn new(host_version: impl Into<String>, dependency: Option<&ResolvedDependency>) -> Self {
        let display = |path: &Path| path.display().to_string();
        Self {
            host_version: host_version.into(),
            ltex_ls_path: dependency.map(|d| display(d.ltex_ls_path.as_path())),
            ltex_ls_version: dependency.and_then(|d| d.ltex_ls_version.clone()),
            java_path: dependency.and_then(|d| d.java_path.as_deref().map(display)),
            java_version: dependency.and_then(|d| d.java_version.clone()),
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
        writeln!(f, "ltex-setup version: {}", self.host_version)?;
        writeln!(f, "ltex-ls path: {}", or_na(&self.ltex_ls_path))?;
        writeln!(f, "ltex-ls version: {}", or_na(&self.ltex_ls_version))?;
        writeln!(f, "Java path: {}", or_na(&self.java_path))?;
        write!(f, "Java version: {}", or_na(&self.java_version))
    }
}

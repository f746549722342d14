use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How per-file failures surface from a project scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// First failure aborts the scan.
    #[default]
    Production,
    /// Failures are logged and collected; the scan still returns its records
    /// so the host can report them and retry on the next source change.
    Development,
}

/// Options threaded explicitly through every extraction call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanOptions {
    pub project_id: String,
    pub deployment_id: String,
    pub root_dir: PathBuf,
    pub api_dir: String,
    pub agent_dir: String,
    pub mount_root: String,
    pub mode: ScanMode,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            project_id: String::new(),
            deployment_id: String::new(),
            root_dir: PathBuf::from("."),
            api_dir: "src/api".to_string(),
            agent_dir: "src/agent".to_string(),
            mount_root: "/api".to_string(),
            mode: ScanMode::Production,
        }
    }
}

impl ScanOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_project(mut self, project_id: &str, deployment_id: &str) -> Self {
        self.project_id = project_id.to_string();
        self.deployment_id = deployment_id.to_string();
        self
    }

    pub fn with_api_dir(mut self, api_dir: &str) -> Self {
        self.api_dir = api_dir.to_string();
        self
    }

    pub fn with_agent_dir(mut self, agent_dir: &str) -> Self {
        self.agent_dir = agent_dir.to_string();
        self
    }

    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Absolute (or root-joined) path for a root-relative filename.
    pub fn resolve(&self, filename: &str) -> PathBuf {
        self.root_dir.join(filename)
    }

    /// Root-relative, `/`-separated form of `path`.
    pub fn relative_filename(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root_dir).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

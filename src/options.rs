//! Profiling option boundary: CLI flags, environment, and `hotpath.toml`.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

pub const PROFILE_DIR_ENV: &str = "HOTPATH_PROFILE_DIR";
pub const DEFAULT_PROFILE_DIR: &str = "hotpath_profiles";

/// Flag group a host test runner mounts into its own CLI.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ProfilingArgs {
    /// Adds per-test profiling output to the report HTML file.
    #[arg(long = "html-profiling")]
    pub profiling: bool,

    /// Adds call graph visualizations based on the profiling to the HTML
    /// file for each test.
    #[arg(long = "html-call-graph")]
    pub call_graph: bool,

    /// Directory for the per-test profile and call-graph artifacts the
    /// report links to. Defaults from HOTPATH_PROFILE_DIR when unset.
    #[arg(long = "html-profile-dir", value_name = "DIR")]
    pub profile_dir: Option<PathBuf>,
}

/// Optional `hotpath.toml` settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub profile_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn load_optional(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<Self>(&s) {
                Ok(cfg) => cfg,
                Err(err) => {
                    tracing::warn!("failed to parse config {}: {err}", path.display());
                    Self::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!("failed to read config {}: {err}", path.display());
                Self::default()
            }
        }
    }
}

/// Resolved profiling options, one set per run.
#[derive(Debug, Clone)]
pub struct Options {
    pub profiling: bool,
    pub call_graph: bool,
    pub profile_dir: PathBuf,
}

impl ProfilingArgs {
    /// Profile-dir precedence: flag, then environment, then config file,
    /// then the built-in default.
    pub fn resolve(self, file: &FileConfig) -> Options {
        let env_dir = std::env::var_os(PROFILE_DIR_ENV).map(PathBuf::from);
        self.resolve_with(file, env_dir)
    }

    fn resolve_with(self, file: &FileConfig, env_dir: Option<PathBuf>) -> Options {
        let profile_dir = self
            .profile_dir
            .or(env_dir)
            .or_else(|| file.profile_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROFILE_DIR));
        Options {
            profiling: self.profiling,
            call_graph: self.call_graph,
            profile_dir,
        }
    }
}

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::search::SearchScope;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "Daynote";
const APP_NAME: &str = "daynote";

pub const TOKEN_ENV: &str = "DAYNOTE_REMOTE_TOKEN";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths)?;
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths)?;
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub export_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("DAYNOTE_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("DAYNOTE_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));

        Ok(Self::rooted(config_dir, config_file, data_root, state_dir))
    }

    /// Lays the standard files out under explicit roots.
    pub fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_dir: PathBuf,
        state_dir: PathBuf,
    ) -> Self {
        Self {
            config_dir,
            config_file,
            snapshot_path: data_dir.join("board.json"),
            export_dir: data_dir.join("exports"),
            data_dir,
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    /// Everything under one directory.
    pub fn under(root: &Path) -> Self {
        let config_dir = root.join("config");
        Self::rooted(
            config_dir.clone(),
            config_dir.join("config.toml"),
            root.join("data"),
            root.join("state"),
        )
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.export_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub history: HistoryConfig,
    pub range: RangeConfig,
    pub sanitize: SanitizeConfig,
    pub view: ViewConfig,
    pub search: SearchOptions,
    pub remote: RemoteConfig,
    pub storage: StorageOptions,
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) -> Result<()> {
        self.storage
            .resolve(paths)
            .context("resolving storage paths")?;
        if self.history.max_entries == 0 {
            tracing::warn!("history.max_entries = 0 disables undo, using 1");
            self.history.max_entries = 1;
        }
        if self.range.max_span_months == 0 {
            tracing::warn!("range.max_span_months = 0 is invalid, using the default");
            self.range.max_span_months = RangeConfig::default().max_span_months;
        }
        Ok(())
    }

    /// Config with every path resolved against `paths`, without touching disk.
    pub fn resolved(paths: &ConfigPaths) -> Result<Self> {
        let mut cfg = Self::default();
        cfg.post_load(paths)?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: crate::history::DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub months_before: u32,
    pub months_after: u32,
    /// Distance in pixels from either scroll edge that triggers an extension.
    pub edge_threshold: f64,
    pub max_span_months: u32,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            months_before: 1,
            months_after: 2,
            edge_threshold: 200.0,
            max_span_months: 36,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    pub max_image_bytes: usize,
    pub max_images_per_card: usize,
    pub max_text_chars: usize,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: 256 * 1024,
            max_images_per_card: 4,
            max_text_chars: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub show_weekends: bool,
    pub expand_all_weeks: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            show_weekends: true,
            expand_all_weeks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub default_scope: SearchScope,
    pub highlight_ms: u64,
    pub miss_notice_ms: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            default_scope: SearchScope::Visible,
            highlight_ms: 4000,
            miss_notice_ms: 1500,
        }
    }
}

impl SearchOptions {
    pub fn highlight_duration(&self) -> Duration {
        Duration::milliseconds(self.highlight_ms as i64)
    }

    pub fn miss_notice_duration(&self) -> Duration {
        Duration::milliseconds(self.miss_notice_ms as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub base_id: String,
    pub table: String,
    /// Prefer the `DAYNOTE_REMOTE_TOKEN` environment variable over this.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.airtable.com/v0".to_string(),
            base_id: String::new(),
            table: "Snapshots".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    pub fn resolved_token(&self) -> Option<String> {
        env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.token.clone().filter(|t| !t.trim().is_empty()))
    }

    pub fn is_configured(&self) -> bool {
        !self.base_id.trim().is_empty() && !self.table.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub snapshot_path: PathBuf,
    pub export_dir: PathBuf,
    /// Pretty-print the local snapshot file.
    pub pretty: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::new(),
            export_dir: PathBuf::new(),
            pretty: false,
        }
    }
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) -> Result<()> {
        if self.snapshot_path.as_os_str().is_empty() {
            self.snapshot_path = paths.snapshot_path.clone();
        }
        if self.export_dir.as_os_str().is_empty() {
            self.export_dir = paths.export_dir.clone();
        }
        Ok(())
    }
}

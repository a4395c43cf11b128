use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::supervisor::RelaunchPolicy;

mod loader;

pub use loader::{ConfigDoc, load, merge};

/// Used when `--config` is not given and the file exists in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "nerf-panel.toml";

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 7860,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TabsConfig {
    #[serde(default = "default_true")]
    pub trainer: bool,
    #[serde(default = "default_true")]
    pub processor: bool,
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            trainer: true,
            processor: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BinariesConfig {
    pub process: String,
    pub train: String,
}

impl Default for BinariesConfig {
    fn default() -> Self {
        Self {
            process: "ns-process-data".into(),
            train: "ns-train".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            level: "info".into(),
        }
    }
}

/// A training method declared in the config file rather than compiled in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExternalMethod {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Field table; see `schema::extract_toml` for the accepted forms.
    #[serde(default)]
    pub fields: Option<toml::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Root shown by path pickers.
    pub root_dir: PathBuf,
    pub run_in_new_terminal: bool,
    pub server: ServerConfig,
    /// Viewer websocket port; 0 picks a free one at launch.
    pub websocket_port: u16,
    pub tabs: TabsConfig,
    pub use_external_methods: bool,
    pub binaries: BinariesConfig,
    pub tick_ms: u64,
    pub relaunch: RelaunchPolicy,
    /// Synthetic form fields (e.g. `verbose`) forwarded to commands.
    pub forward_synthetic: Vec<String>,
    pub log: LogConfig,
    pub external_methods: Vec<ExternalMethod>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            run_in_new_terminal: false,
            server: ServerConfig::default(),
            websocket_port: 7007,
            tabs: TabsConfig::default(),
            use_external_methods: false,
            binaries: BinariesConfig::default(),
            tick_ms: 1000,
            relaunch: RelaunchPolicy::default(),
            forward_synthetic: Vec::new(),
            log: LogConfig::default(),
            external_methods: Vec::new(),
        }
    }
}

/// Values given on the command line; each one set overrides the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root_dir: Option<PathBuf>,
    pub run_in_new_terminal: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub websocket_port: Option<u16>,
    pub disable_trainer_tab: bool,
    pub disable_data_processor_tab: bool,
    pub use_external_methods: bool,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl PanelConfig {
    pub fn from_doc(doc: &ConfigDoc) -> Result<Self> {
        let cfg: PanelConfig = doc.deserialize_path("")?.unwrap_or_default();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path`, or the default file if present, or built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.is_file() {
                    return Ok(Self::default());
                }
                p
            }
        };
        let doc = load(&path)?;
        Self::from_doc(&doc)
    }

    pub fn apply(&mut self, o: &Overrides) {
        if let Some(v) = &o.root_dir {
            self.root_dir = v.clone();
        }
        if o.run_in_new_terminal {
            self.run_in_new_terminal = true;
        }
        if let Some(v) = &o.host {
            self.server.host = v.clone();
        }
        if let Some(v) = o.port {
            self.server.port = v;
        }
        if let Some(v) = o.websocket_port {
            self.websocket_port = v;
        }
        if o.disable_trainer_tab {
            self.tabs.trainer = false;
        }
        if o.disable_data_processor_tab {
            self.tabs.processor = false;
        }
        if o.use_external_methods {
            self.use_external_methods = true;
        }
        if let Some(v) = &o.log_dir {
            self.log.dir = v.clone();
        }
        if let Some(v) = &o.log_level {
            self.log.level = v.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(Error::config("tick_ms must be greater than zero"));
        }
        if self.binaries.process.trim().is_empty() || self.binaries.train.trim().is_empty() {
            return Err(Error::config("binaries.process and binaries.train must be set"));
        }
        for m in &self.external_methods {
            if m.name.trim().is_empty() {
                return Err(Error::config("external_methods entries need a name"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(&path, "").unwrap();
        let cfg = PanelConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg, PanelConfig::default());
        assert_eq!(cfg.server.port, 7860);
        assert_eq!(cfg.binaries.train, "ns-train");
        assert_eq!(cfg.relaunch, RelaunchPolicy::Detach);
    }

    #[test]
    fn extends_and_imports_merge_with_local_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.toml"),
            "tick_ms = 500\n[server]\nport = 9000\nhost = \"127.0.0.1\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("bins.toml"), "process = \"/opt/ns/process\"\ntrain = \"/opt/ns/train\"\n")
            .unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(
            &path,
            "extends = \"base.toml\"\nrelaunch = \"reject\"\n[server]\nport = 9100\n[binaries]\nimports = [\"bins.toml\"]\ntrain = \"my-train\"\n",
        )
        .unwrap();

        let cfg = PanelConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.tick_ms, 500);
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.binaries.process, "/opt/ns/process");
        assert_eq!(cfg.binaries.train, "my-train");
        assert_eq!(cfg.relaunch, RelaunchPolicy::Reject);
    }

    #[test]
    fn imports_expand_in_nested_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("leaf.toml"), "width = 3\nheight = 4\n").unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(
            &path,
            "[outer.inner]\nimports = [\"leaf.toml\"]\nheight = 9\n",
        )
        .unwrap();

        let doc = load(&path).unwrap();
        assert_eq!(doc.lookup("outer.inner.width").and_then(|v| v.as_integer()), Some(3));
        assert_eq!(doc.lookup("outer.inner.height").and_then(|v| v.as_integer()), Some(9));
        assert!(doc.lookup("outer.inner.imports").is_none());
    }

    #[test]
    fn import_cycles_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), "extends = \"b.toml\"\n").unwrap();
        std::fs::write(dir.path().join("b.toml"), "extends = \"a.toml\"\n").unwrap();
        let err = PanelConfig::load(Some(&dir.path().join("a.toml"))).unwrap_err();
        assert!(err.to_string().contains("cycle"), "unexpected err: {err}");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(&path, "tick_ms = 0\n").unwrap();
        let err = PanelConfig::load(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);

        std::fs::write(&path, "relaunch = \"queue\"\n").unwrap();
        let err = PanelConfig::load(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn external_methods_parse_with_field_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.toml");
        std::fs::write(
            &path,
            "use_external_methods = true\n[[external_methods]]\nname = \"my-nerf\"\ndescription = \"mine\"\n[external_methods.fields]\nhidden_dim = 32\n",
        )
        .unwrap();
        let cfg = PanelConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.external_methods.len(), 1);
        assert!(cfg.external_methods[0].fields.is_some());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let mut cfg = PanelConfig::default();
        cfg.apply(&Overrides {
            port: Some(8000),
            disable_trainer_tab: true,
            log_level: Some("debug".into()),
            ..Default::default()
        });
        assert_eq!(cfg.server.port, 8000);
        assert!(!cfg.tabs.trainer);
        assert!(cfg.tabs.processor);
        assert_eq!(cfg.log.level, "debug");
    }
}

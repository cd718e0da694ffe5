use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Config, CoreError, Precedence};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub engine: Option<EngineConfig>,
    pub paths: Option<PathsConfig>,
    /// Replaced as a whole by an overlay. Missing ranks take their defaults.
    pub precedence: Option<Precedence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub jobs_num: Option<usize>,
    pub sort_desc: Option<bool>,
    pub refs_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub db_path: Option<String>,
    pub model_path: Option<String>,
}

/// Platform config directory path: `<config_dir>/bhlnames/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bhlnames").join("config.toml"))
}

/// Load config by cascading CWD `.bhlnames.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".bhlnames.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let (be, oe) = (base.engine.unwrap_or_default(), overlay.engine.unwrap_or_default());
    let (bp, op) = (base.paths.unwrap_or_default(), overlay.paths.unwrap_or_default());
    ConfigFile {
        engine: Some(EngineConfig {
            jobs_num: oe.jobs_num.or(be.jobs_num),
            sort_desc: oe.sort_desc.or(be.sort_desc),
            refs_limit: oe.refs_limit.or(be.refs_limit),
        }),
        paths: Some(PathsConfig {
            db_path: op.db_path.or(bp.db_path),
            model_path: op.model_path.or(bp.model_path),
        }),
        precedence: overlay.precedence.or(base.precedence),
    }
}

impl ConfigFile {
    /// Apply the values present in the file on top of `config`.
    pub fn apply_to(&self, mut config: Config) -> Result<Config, CoreError> {
        if let Some(engine) = &self.engine {
            if let Some(n) = engine.jobs_num {
                if n == 0 {
                    return Err(CoreError::Config("jobs_num must be positive".to_string()));
                }
                config.jobs_num = n;
            }
            if let Some(desc) = engine.sort_desc {
                config.sort_desc = desc;
            }
            if let Some(limit) = engine.refs_limit {
                config.refs_limit = limit;
            }
        }
        if let Some(paths) = &self.paths {
            if let Some(db) = &paths.db_path {
                config.db_path = Some(PathBuf::from(db));
            }
            if let Some(model) = &paths.model_path {
                config.model_path = Some(PathBuf::from(model));
            }
        }
        if let Some(precedence) = self.precedence {
            precedence.validate()?;
            config.precedence = precedence;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_parses() {
        let toml_str = "[engine]\njobs_num = 8\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(parsed.engine.unwrap().jobs_num, Some(8));
        assert!(parsed.paths.is_none());
        assert!(parsed.precedence.is_none());
    }

    #[test]
    fn partial_precedence_keeps_defaults() {
        let toml_str = "[precedence]\nref_volume = 4\nref_pages = 0\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let p = parsed.precedence.unwrap();
        assert_eq!(p.ref_volume, 4);
        assert_eq!(p.ref_pages, 0);
        assert_eq!(p.year, 3);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            engine: Some(EngineConfig {
                jobs_num: Some(2),
                refs_limit: Some(10),
                ..Default::default()
            }),
            paths: Some(PathsConfig {
                db_path: Some("/base/bhl.db".to_string()),
                model_path: Some("/base/model.json".to_string()),
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            engine: Some(EngineConfig {
                jobs_num: Some(16),
                ..Default::default()
            }),
            paths: Some(PathsConfig {
                db_path: Some("/overlay/bhl.db".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let engine = merged.engine.unwrap();
        assert_eq!(engine.jobs_num, Some(16));
        assert_eq!(engine.refs_limit, Some(10));
        let paths = merged.paths.unwrap();
        assert_eq!(paths.db_path.as_deref(), Some("/overlay/bhl.db"));
        assert_eq!(paths.model_path.as_deref(), Some("/base/model.json"));
    }

    #[test]
    fn apply_to_defaults() {
        let file = ConfigFile {
            engine: Some(EngineConfig {
                sort_desc: Some(true),
                ..Default::default()
            }),
            paths: Some(PathsConfig {
                db_path: Some("/data/bhl.db".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = file.apply_to(Config::default()).unwrap();
        assert!(config.sort_desc);
        assert_eq!(config.jobs_num, 4);
        assert_eq!(config.db_path, Some(PathBuf::from("/data/bhl.db")));
        assert!(config.model_path.is_none());
    }

    #[test]
    fn apply_rejects_bad_values() {
        let zero_jobs = ConfigFile {
            engine: Some(EngineConfig {
                jobs_num: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            zero_jobs.apply_to(Config::default()),
            Err(CoreError::Config(_))
        ));

        let dup = ConfigFile {
            precedence: Some(Precedence {
                year: 0,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            dup.apply_to(Config::default()),
            Err(CoreError::InvalidPrecedence(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[paths]\nmodel_path = \"/m.json\"\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.paths.unwrap().model_path.as_deref(), Some("/m.json"));

        std::fs::write(&path, "[engine\n").unwrap();
        assert!(load_from_path(&path).is_none());
        assert!(load_from_path(&dir.path().join("missing.toml")).is_none());
    }
}

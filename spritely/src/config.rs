//! User preferences, loaded once from `spritely.toml` in the preferences directory.

use std::time::Duration;

use spritely_core::history::HistoryConfig;

const DOCUMENTATION: &str = r"# Spritely settings. You may edit this file, but be aware that formatting and comments will not
# be preserved. Missing fields take their default value.

# lock_timeout_ms: How long an edit waits for a busy document before giving up.
# [undo] max_depth: Undo steps kept per document.
# [undo] max_bytes: Memory budget for each document's undo history, 0 for unlimited.
# [backup] enabled: Periodically snapshot documents with unsaved changes.
# [backup] period_secs: Seconds between backup passes.

";

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Undo {
    pub max_depth: usize,
    pub max_bytes: usize,
}
impl Default for Undo {
    fn default() -> Self {
        let HistoryConfig {
            max_depth,
            max_bytes,
        } = HistoryConfig::default();
        Self {
            max_depth,
            max_bytes,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Backup {
    pub enabled: bool,
    pub period_secs: u64,
}
impl Default for Backup {
    fn default() -> Self {
        Self {
            enabled: true,
            period_secs: 60,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub lock_timeout_ms: u64,
    pub undo: Undo,
    pub backup: Backup,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 500,
            undo: Undo::default(),
            backup: Backup::default(),
        }
    }
}
impl Config {
    const FILENAME: &'static str = "spritely.toml";
    /// Shared global settings, loaded from user preferences.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_CONFIG: std::sync::OnceLock<Config> = std::sync::OnceLock::new();

        GLOBAL_CONFIG.get_or_init(|| match preferences_dir() {
            None => {
                log::warn!("No preferences directory, using default settings.");
                Self::default()
            }
            Some(dir) => Self::load_or_default(&dir),
        })
    }
    /// Read the settings file in `dir`, writing the defaults there if there is none.
    fn load_or_default(dir: &std::path::Path) -> Self {
        let path = dir.join(Self::FILENAME);
        let string = match std::fs::read_to_string(&path) {
            Ok(string) => string,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                if let Err(e) = config.save_in(dir) {
                    log::warn!("Failed to write default settings:\n{e:?}");
                }
                return config;
            }
            Err(e) => {
                log::warn!("Failed to read {path:?}, using default settings: {e}");
                return Self::default();
            }
        };
        match Self::parse(&string) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to parse {path:?}, using default settings:\n{e:?}");
                Self::default()
            }
        }
    }
    pub fn parse(string: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(string)?)
    }
    fn to_documented_string(&self) -> anyhow::Result<String> {
        let string = toml::ser::to_string_pretty(self)?;
        Ok(DOCUMENTATION.to_owned() + &string)
    }
    /// Write these settings to the settings file in `dir`, creating `dir` itself if needed.
    pub fn save_in(&self, dir: &std::path::Path) -> anyhow::Result<()> {
        let path = dir.join(Self::FILENAME);
        let result: anyhow::Result<()> = try_block::try_block! {
            // Not recursive. If the preferences dir itself is missing, the user probably has a good reason.
            // Ignore errors (could already exist). Any real errors will be emitted by the write below.
            let _ = std::fs::DirBuilder::new().create(dir);
            std::fs::write(&path, self.to_documented_string()?)?;
            Ok(())
        };
        result.map_err(|e| e.context(format!("writing {path:?}")))
    }
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
    #[must_use]
    pub fn history(&self) -> HistoryConfig {
        HistoryConfig {
            max_depth: self.undo.max_depth,
            max_bytes: self.undo.max_bytes,
        }
    }
    /// Time between backup passes, or `None` if backups are off.
    #[must_use]
    pub fn backup_period(&self) -> Option<Duration> {
        self.backup
            .enabled
            .then(|| Duration::from_secs(self.backup.period_secs.max(1)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.lock_timeout(), Duration::from_millis(500));
        assert_eq!(config.history().max_depth, 1000);
        assert_eq!(config.history().max_bytes, 64 * 1024 * 1024);
        assert_eq!(config.backup_period(), Some(Duration::from_secs(60)));
    }
    #[test]
    fn missing_fields_are_defaulted() {
        let config = Config::parse(
            r"
            lock_timeout_ms = 20
            [undo]
            max_bytes = 0
            [backup]
            enabled = false
            ",
        )
        .unwrap();
        assert_eq!(config.lock_timeout(), Duration::from_millis(20));
        assert_eq!(config.undo.max_depth, 1000);
        assert_eq!(config.undo.max_bytes, 0);
        assert_eq!(config.backup.period_secs, 60);
        assert_eq!(config.backup_period(), None);
    }
    #[test]
    fn written_file_reads_back() {
        let config = Config {
            lock_timeout_ms: 1234,
            undo: Undo {
                max_depth: 7,
                max_bytes: 4096,
            },
            backup: Backup {
                enabled: true,
                period_secs: 0,
            },
        };
        let string = config.to_documented_string().unwrap();
        assert!(string.starts_with("# Spritely settings."));
        let read = Config::parse(&string).unwrap();
        assert_eq!(read, config);
        // Never spin.
        assert_eq!(read.backup_period(), Some(Duration::from_secs(1)));
    }
    #[test]
    fn defaults_are_written_once() {
        let dir = std::env::temp_dir().join(format!("spritely-config-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        // Missing: defaulted, and written back.
        assert_eq!(Config::load_or_default(&dir), Config::default());
        let path = dir.join(Config::FILENAME);
        assert!(path.is_file());

        // Present: read, not overwritten.
        let edited = Config {
            lock_timeout_ms: 42,
            ..Config::default()
        };
        edited.save_in(&dir).unwrap();
        assert_eq!(Config::load_or_default(&dir), edited);

        std::fs::write(&path, "lock_timeout_ms = [").unwrap();
        assert_eq!(Config::load_or_default(&dir), Config::default());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "lock_timeout_ms = [");

        std::fs::remove_dir_all(&dir).unwrap();
    }
    #[test]
    fn bad_types_are_rejected() {
        assert!(Config::parse("lock_timeout_ms = \"soon\"").is_err());
    }
}

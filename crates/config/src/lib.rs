//! Layered configuration for vidsplit.
//!
//! Sources, lowest to highest precedence:
//!
//! 1. Built-in defaults.
//! 2. `config.toml` in the platform configuration directory.
//! 3. The TOML file named by `VIDSPLIT_CONFIG`, if set.
//! 4. `VIDSPLIT_*` environment variables; nested keys are split on `__`
//!    (`VIDSPLIT_REMOTE__BUCKET`).

pub mod error;
mod remote;
mod size;

pub use crate::remote::{BackendConfig, RemoteConfig};
pub use crate::size::parse_size;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Deserializer};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use vidsplit_compress::Compression;

/// Environment variable naming an extra configuration file.
pub const CONFIG_ENV: &str = "VIDSPLIT_CONFIG";
const ENV_PREFIX: &str = "VIDSPLIT_";

const DEFAULT_CAPACITY: u64 = 20 * (1 << 30);
pub const DEFAULT_NAMING: &str = "{{ root }}_{{ index }}_{{ count }}Files";
pub const DEFAULT_REPORT: &str = "organization_report.txt";

fn default_capacity() -> NonZeroU64 {
    NonZeroU64::new(DEFAULT_CAPACITY).unwrap_or(NonZeroU64::MIN)
}

fn default_extensions() -> Vec<String> {
    vec!["mp4".to_string()]
}

fn default_naming() -> String {
    DEFAULT_NAMING.to_string()
}

fn default_report() -> String {
    DEFAULT_REPORT.to_string()
}

fn deserialize_compression<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Compression, D::Error> {
    let name = String::deserialize(deserializer)?;
    name.parse().map_err(|e: vidsplit_compress::error::Error| serde::de::Error::custom(&*e))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Upper bound, in bytes, a partition is filled towards.
    #[serde(default = "default_capacity", deserialize_with = "size::deserialize_capacity")]
    pub capacity: NonZeroU64,
    /// Eligible file extensions, without the dot. Matched case-insensitively.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Partition directory name template.
    #[serde(default = "default_naming")]
    pub naming: String,
    /// File name of the report written at the source root.
    #[serde(default = "default_report")]
    pub report: String,
    #[serde(default, deserialize_with = "deserialize_compression")]
    pub compression: Compression,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            extensions: default_extensions(),
            naming: default_naming(),
            report: default_report(),
            compression: Compression::default(),
            remote: None,
        }
    }
}

impl Config {
    /// Load from the platform config file, `VIDSPLIT_CONFIG` and the
    /// environment.
    pub fn load() -> Result<Self> {
        let mut files = Vec::new();
        if let Some(dirs) = project_dirs() {
            files.push(dirs.config_dir().join("config.toml"));
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.is_file() {
                exn::bail!(ErrorKind::invalid("VIDSPLIT_CONFIG", format!("{} is not a file", path.display())));
            }
            files.push(path);
        }
        let data_dir = project_dirs().map(|dirs| dirs.data_dir().to_path_buf());
        Self::from_files(files, data_dir.as_deref())
    }

    /// Load from the given TOML files (missing files are ignored, later
    /// files win) and then the environment.
    ///
    /// `data_dir` is where per-remote credential files default to.
    pub fn from_files(files: impl IntoIterator<Item = PathBuf>, data_dir: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();
        for file in files {
            tracing::debug!(path = %file.display(), "Reading configuration file");
            figment = figment.merge(Toml::file(file));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"));
        let mut config: Config = figment.extract().map_err(|e| ErrorKind::Load(e.to_string()))?;
        if let Some(remote) = config.remote.as_mut() {
            remote.resolve_credentials(data_dir);
        }
        config.normalize()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    /// Validate values and bring extensions into canonical form
    /// (lower-case, no leading dot).
    pub fn normalize(&mut self) -> Result<()> {
        let mut extensions = Vec::with_capacity(self.extensions.len());
        for extension in &self.extensions {
            let extension = extension.trim().trim_start_matches('.').to_lowercase();
            if extension.is_empty() || extension.contains(['/', '\\', '.']) {
                exn::bail!(ErrorKind::invalid("extensions", format!("{extension:?} is not a file extension")));
            }
            if !extensions.contains(&extension) {
                extensions.push(extension);
            }
        }
        if extensions.is_empty() {
            exn::bail!(ErrorKind::invalid("extensions", "at least one extension is required"));
        }
        self.extensions = extensions;

        if self.naming.trim().is_empty() {
            exn::bail!(ErrorKind::invalid("naming", "must not be empty"));
        }
        let report = self.report.trim();
        if report.is_empty() || report == "." || report == ".." || report.contains(['/', '\\']) {
            exn::bail!(ErrorKind::invalid("report", "must be a plain file name"));
        }
        self.report = report.to_string();
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "vidsplit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load(jail: &Jail, files: &[&str]) -> Result<Config> {
        let files = files.iter().map(|f| jail.directory().join(f));
        Config::from_files(files, Some(Path::new("/data")))
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            let config = load(jail, &["missing.toml"]).unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.capacity.get(), 21_474_836_480);
            assert_eq!(config.extensions, vec!["mp4"]);
            assert_eq!(config.compression, Compression::Deflate);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "base.toml",
                r#"
                capacity = "4 GiB"
                extensions = [".MP4", "mkv", "mp4"]
                compression = "stored"
                "#,
            )?;
            jail.create_file("override.toml", "capacity = 1000")?;
            jail.set_env("VIDSPLIT_REPORT", "summary.txt");
            let config = load(jail, &["base.toml", "override.toml"]).unwrap();
            assert_eq!(config.capacity.get(), 1000);
            assert_eq!(config.extensions, vec!["mp4", "mkv"]);
            assert_eq!(config.compression, Compression::Stored);
            assert_eq!(config.report, "summary.txt");
            Ok(())
        });
    }

    #[test]
    fn test_env_capacity_with_unit() {
        Jail::expect_with(|jail| {
            jail.set_env("VIDSPLIT_CAPACITY", "500MB");
            assert_eq!(load(jail, &[]).unwrap().capacity.get(), 500_000_000);
            Ok(())
        });
    }

    #[test]
    fn test_nested_remote_from_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [remote]
                type = "local"
                path = "/mnt/nas"
                "#,
            )?;
            jail.set_env("VIDSPLIT_REMOTE__PARENT", "Videos");
            let remote = load(jail, &["config.toml"]).unwrap().remote.unwrap();
            assert_eq!(remote.backend, BackendConfig::Local { path: PathBuf::from("/mnt/nas") });
            assert_eq!(remote.parent.as_deref(), Some("Videos"));
            assert_eq!(remote.consent_timeout().as_secs(), 300);
            assert_eq!(remote.credentials_path(), Some(Path::new("/data/remote.credentials.json")));
            Ok(())
        });
    }

    #[test]
    fn test_s3_remote() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [remote]
                name = "b2"
                type = "s3"
                bucket = "videos"
                region = "us-west-004"
                key_id = "id"
                key_secret = "secret"
                consent_timeout = 60
                "#,
            )?;
            let remote = load(jail, &["config.toml"]).unwrap().remote.unwrap();
            assert!(matches!(remote.backend, BackendConfig::S3 { ref bucket, .. } if bucket == "videos"));
            assert_eq!(remote.consent_timeout().as_secs(), 60);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_zero_capacity() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "capacity = 0")?;
            let err = load(jail, &["config.toml"]).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load(_)));
            Ok(())
        });
    }

    #[test]
    fn test_rejects_unknown_compression() {
        Jail::expect_with(|jail| {
            jail.set_env("VIDSPLIT_COMPRESSION", "lz4");
            let err = load(jail, &[]).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load(msg) if msg.contains("lz4")));
            Ok(())
        });
    }

    #[test]
    fn test_normalize_trims_report_name() {
        let mut config = Config { report: " summary.txt ".into(), ..Config::default() };
        config.normalize().unwrap();
        assert_eq!(config.report, "summary.txt");
    }

    #[rstest::rstest]
    #[case::no_extensions(Config { extensions: vec![], ..Config::default() }, "extensions")]
    #[case::dotted_extension(Config { extensions: vec!["tar.gz".into()], ..Config::default() }, "extensions")]
    #[case::empty_naming(Config { naming: " ".into(), ..Config::default() }, "naming")]
    #[case::nested_report(Config { report: "logs/report.txt".into(), ..Config::default() }, "report")]
    fn test_normalize_rejects(#[case] mut config: Config, #[case] expected_key: &str) {
        let err = config.normalize().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { key, .. } if *key == expected_key));
    }
}

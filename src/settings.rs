use crate::args::{GlobalArgs, ListObjectsArgs};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_FILE: &str = ".s3test.yaml";
pub const DEFAULT_OBJECT_PREFIX: &str = "transient_BatchManagerCache/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 50;
/// Upper bound on the request deadline, one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;
pub const DEFAULT_LIMIT: u32 = 1000;
pub const DEFAULT_REGION: &str = "eu-west-3";

/// Values read from the YAML config file. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FileSettings {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub timeout: Option<u64>,
    pub prefix: Option<String>,
    pub debug: Option<bool>,
    pub limit: Option<u32>,

    /// Path the values were read from, if a file was found.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl FileSettings {
    /// Reads the config file at `path`, or `$HOME/.s3test.yaml` when no path
    /// was given. A file that does not exist yields empty settings.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read config file {}", path.display()))
            }
        };

        let settings = Self::parse(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(Self {
            source: Some(path),
            ..settings
        })
    }

    pub fn parse(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(Into::into)
    }

    fn default_path() -> Result<PathBuf> {
        env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(DEFAULT_CONFIG_FILE))
            .context("failed to locate home directory")
    }
}

/// Fully resolved configuration for one invocation of `listObjects`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub key: String,
    pub secret: String,
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub prefix: String,
    pub timeout: Duration,
    pub limit: u32,
    pub debug: bool,
}

impl Settings {
    /// Merges the layers in order of precedence: flags and environment
    /// (already combined by clap), then the config file, then defaults.
    pub fn resolve(
        global: &GlobalArgs,
        list: &ListObjectsArgs,
        file: FileSettings,
    ) -> Result<Self> {
        let timeout = layer(&list.timeout, file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout > MAX_TIMEOUT_SECS {
            bail!(
                "timeout {}s exceeds the maximum of {}s",
                timeout,
                MAX_TIMEOUT_SECS
            );
        }

        let settings = Self {
            key: layer(&global.key, file.key).unwrap_or_default(),
            secret: layer(&global.secret, file.secret).unwrap_or_default(),
            endpoint: layer(&global.endpoint, file.endpoint).unwrap_or_default(),
            bucket: layer(&global.bucket, file.bucket).unwrap_or_default(),
            region: layer(&global.region, file.region)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            prefix: layer(&list.prefix, file.prefix)
                .unwrap_or_else(|| DEFAULT_OBJECT_PREFIX.to_string()),
            timeout: Duration::from_secs(timeout),
            limit: layer(&list.limit, file.limit).unwrap_or(DEFAULT_LIMIT),
            debug: layer(&list.debug, file.debug).unwrap_or(false),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let missing = [
            ("key", &self.key),
            ("secret", &self.secret),
            ("endpoint", &self.endpoint),
            ("bucket", &self.bucket),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if !missing.is_empty() {
            bail!("missing params ({}), abort!", missing.join(", "));
        }

        Ok(())
    }
}

fn layer<T: Clone>(arg: &Option<T>, file: Option<T>) -> Option<T> {
    arg.clone().or(file)
}

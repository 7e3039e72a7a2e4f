use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

const MIB: u64 = 1024 * 1024;

/// Size and count ceilings applied to every uploaded archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLimits {
    /// Largest raw archive accepted, in bytes.
    pub max_upload_bytes: u64,
    /// Largest number of entries (files and directories) in one archive.
    pub max_entries: usize,
    /// Ceiling on the sum of decompressed bytes of all kept entries.
    pub max_extracted_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 50 * MIB,
            max_entries: 1000,
            max_extracted_bytes: 100 * MIB,
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub limits: ArchiveLimits,
    /// Upper bound on concurrent object store writes during one ingestion.
    pub upload_concurrency: usize,
    pub max_deployments_per_owner: i64,
    /// First path segment under which deployments are served, e.g. `deploy`.
    pub mount_prefix: String,
    /// Suffix appended to every normalized deployment name, e.g. `.site`.
    pub name_suffix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            storage_dir: "./data/objects".into(),
            database_url: "sqlite://./data/meta/artifact_host.db".into(),
            limits: ArchiveLimits::default(),
            upload_concurrency: 5,
            max_deployments_per_owner: 50,
            mount_prefix: "deploy".into(),
            name_suffix: ".site".into(),
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Content-addressed static site host")]
pub struct Args {
    /// Host to bind to (overrides ARTIFACT_HOST_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ARTIFACT_HOST_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where artifact files are stored (overrides ARTIFACT_HOST_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides ARTIFACT_HOST_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Maximum concurrent uploads per ingestion (overrides ARTIFACT_HOST_UPLOAD_CONCURRENCY)
    #[arg(long)]
    pub upload_concurrency: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let defaults = Self::default();

        // --- Environment fallback ---
        let env_host = env::var("ARTIFACT_HOST_HOST").unwrap_or(defaults.host);
        let env_port = env_parse("ARTIFACT_HOST_PORT", defaults.port)?;
        let env_storage = env::var("ARTIFACT_HOST_STORAGE_DIR").unwrap_or(defaults.storage_dir);
        let env_db = env::var("ARTIFACT_HOST_DATABASE_URL").unwrap_or(defaults.database_url);
        let env_concurrency =
            env_parse("ARTIFACT_HOST_UPLOAD_CONCURRENCY", defaults.upload_concurrency)?;

        let limits = ArchiveLimits {
            max_upload_bytes: env_parse(
                "ARTIFACT_HOST_MAX_UPLOAD_BYTES",
                defaults.limits.max_upload_bytes,
            )?,
            max_entries: env_parse(
                "ARTIFACT_HOST_MAX_ARCHIVE_ENTRIES",
                defaults.limits.max_entries,
            )?,
            max_extracted_bytes: env_parse(
                "ARTIFACT_HOST_MAX_EXTRACTED_BYTES",
                defaults.limits.max_extracted_bytes,
            )?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            limits,
            upload_concurrency: args.upload_concurrency.unwrap_or(env_concurrency).max(1),
            max_deployments_per_owner: env_parse(
                "ARTIFACT_HOST_MAX_DEPLOYMENTS",
                defaults.max_deployments_per_owner,
            )?,
            mount_prefix: env::var("ARTIFACT_HOST_MOUNT_PREFIX")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or(defaults.mount_prefix),
            name_suffix: env::var("ARTIFACT_HOST_NAME_SUFFIX").unwrap_or(defaults.name_suffix),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read `name` from the environment and parse it, falling back to `default`
/// when the variable is unset.
fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

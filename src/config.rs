use crate::services::storage_service::DEFAULT_MAX_UPLOAD_BYTES;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    /// Shared secret for `DELETE /uploads/*`; `None` leaves deletion open.
    pub backend_secret: Option<String>,
    /// Prefix under which the reverse proxy publishes `/media`.
    pub public_prefix: String,
    pub max_upload_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            storage_dir: PathBuf::from("./storage"),
            backend_secret: None,
            public_prefix: "/api/media".into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Image upload and media serving service")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage root for uploads and thumbnails (overrides STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Public URL prefix for media links (overrides PUBLIC_MEDIA_PREFIX)
    #[arg(long)]
    pub public_prefix: Option<String>,

    /// Upload ceiling in bytes (overrides MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |key| env::var(key))
    }

    /// Merge parsed CLI args over values looked up through `var`.
    fn merge<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let defaults = Self::default();

        // --- Environment fallback ---
        let env_host = var("HOST").unwrap_or(defaults.host);
        let env_port = match var("PORT") {
            Ok(value) => parse_port(&value)?,
            Err(env::VarError::NotPresent) => defaults.port,
            Err(err) => return Err(err).context("reading PORT"),
        };
        let env_storage = var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);
        let env_prefix = var("PUBLIC_MEDIA_PREFIX").unwrap_or(defaults.public_prefix);
        let env_max = parse_env_or(&var, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?;
        let backend_secret = var("BACKEND_SECRET").ok().filter(|s| !s.is_empty());

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            backend_secret,
            public_prefix: args.public_prefix.unwrap_or(env_prefix),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Accept both `8080` and the `:8080` listen-address form.
fn parse_port(value: &str) -> Result<u16> {
    value
        .trim()
        .trim_start_matches(':')
        .parse::<u16>()
        .with_context(|| format!("parsing PORT value `{}`", value))
}

fn parse_env_or<F, T>(var: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_without_env_or_flags() {
        let cfg = AppConfig::merge(Args::default(), lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.storage_dir, PathBuf::from("./storage"));
        assert_eq!(cfg.backend_secret, None);
        assert_eq!(cfg.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(cfg.addr(), "0.0.0.0:8080");
    }

    #[test]
    fn env_values_are_read() {
        let cfg = AppConfig::merge(
            Args::default(),
            lookup(&[
                ("PORT", ":9090"),
                ("STORAGE_DIR", "/var/media"),
                ("BACKEND_SECRET", "s3cret"),
                ("PUBLIC_MEDIA_PREFIX", "/m"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.storage_dir, PathBuf::from("/var/media"));
        assert_eq!(cfg.backend_secret.as_deref(), Some("s3cret"));
        assert_eq!(cfg.public_prefix, "/m");
    }

    #[test]
    fn flags_override_env() {
        let args = Args {
            port: Some(7000),
            storage_dir: Some(PathBuf::from("/flag")),
            ..Args::default()
        };
        let cfg = AppConfig::merge(args, lookup(&[("PORT", "9090"), ("STORAGE_DIR", "/env")])).unwrap();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.storage_dir, PathBuf::from("/flag"));
    }

    #[test]
    fn empty_secret_disables_the_check() {
        let cfg = AppConfig::merge(Args::default(), lookup(&[("BACKEND_SECRET", "")])).unwrap();
        assert_eq!(cfg.backend_secret, None);
    }

    #[test]
    fn bad_numbers_are_errors() {
        assert!(AppConfig::merge(Args::default(), lookup(&[("PORT", "eighty")])).is_err());
        assert!(AppConfig::merge(Args::default(), lookup(&[("MAX_UPLOAD_BYTES", "-1")])).is_err());
    }
}

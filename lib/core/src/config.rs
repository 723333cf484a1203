use std::path::PathBuf;

/// Common configuration shared by service binaries.
///
/// Parsed from command-line arguments or environment by the hosting binary,
/// then passed to storage layer initialization.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory all storage paths default under.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Directory for blob storage (uploaded product images).
    /// Defaults to `{data_dir}/blobs/` if not specified.
    pub blob_dir: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            blob_dir: None,
            listen: "0.0.0.0:3000".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from command-line arguments.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--sqlite=PATH`
    /// - `--blob-dir=PATH`
    /// - `--listen=ADDR`
    pub fn from_args(args: &[String]) -> Self {
        let mut config = ServiceConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                config.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--sqlite=") {
                config.sqlite_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--blob-dir=") {
                config.blob_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--listen=") {
                config.listen = val.to_string();
            }
        }

        config
    }

    /// Resolve the SQLite database path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.sqlite"))
    }

    /// Resolve the blob storage directory.
    pub fn resolve_blob_dir(&self) -> PathBuf {
        self.blob_dir
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("blobs"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let args = vec![
            "--data-dir=/tmp/producto".to_string(),
            "--listen=127.0.0.1:9090".to_string(),
        ];
        let config = ServiceConfig::from_args(&args);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/producto")));
        assert_eq!(config.listen, "127.0.0.1:9090");
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_sqlite_path(),
            PathBuf::from("/data/data.sqlite")
        );
        assert_eq!(config.resolve_blob_dir(), PathBuf::from("/data/blobs"));
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            sqlite_path: Some(PathBuf::from("/elsewhere/inv.sqlite")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_sqlite_path(),
            PathBuf::from("/elsewhere/inv.sqlite")
        );
    }
}

//! Layered configuration loading shared by every dashboard crate.
//!
//! Settings come from `<crate>/config/base.yaml`, overlaid by `APP_`-prefixed
//! environment variables using `__` as the nesting separator
//! (e.g. `APP_API__BASE_URL`).

use crate::error::CoreError;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "APP";

/// Resolve the `config/` directory of a crate.
///
/// Works both when the process runs from the crate directory and from the
/// workspace root.
pub fn configuration_directory(base_path: &Path, crate_dir: &str) -> PathBuf {
    if base_path.ends_with(crate_dir) {
        base_path.join("config")
    } else {
        base_path.join(crate_dir).join("config")
    }
}

/// Load settings for `crate_dir` relative to the current directory.
pub fn load_configuration<T: DeserializeOwned>(crate_dir: &str) -> Result<T, CoreError> {
    dotenvy::dotenv().ok();

    let base_path = std::env::current_dir()?;
    load_configuration_from(&configuration_directory(&base_path, crate_dir))
}

/// Load settings from an explicit configuration directory.
pub fn load_configuration_from<T: DeserializeOwned>(directory: &Path) -> Result<T, CoreError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(directory.join("base.yaml")).required(true))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<T>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        server: SampleServer,
    }

    #[derive(Debug, Deserialize)]
    struct SampleServer {
        host: String,
        port: u16,
    }

    #[test]
    fn test_configuration_directory_from_workspace_root() {
        let dir = configuration_directory(Path::new("/work"), "dashboard-auth");
        assert_eq!(dir, PathBuf::from("/work/dashboard-auth/config"));
    }

    #[test]
    fn test_configuration_directory_from_crate_dir() {
        let dir = configuration_directory(Path::new("/work/dashboard-auth"), "dashboard-auth");
        assert_eq!(dir, PathBuf::from("/work/dashboard-auth/config"));
    }

    #[test]
    fn test_load_configuration_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("base.yaml")).unwrap();
        writeln!(file, "server:\n  host: \"127.0.0.1\"\n  port: 8080").unwrap();

        let settings: Sample = load_configuration_from(dir.path()).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_missing_base_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Sample, _> = load_configuration_from(dir.path());
        assert!(matches!(result, Err(CoreError::ConfigError(_))));
    }
}

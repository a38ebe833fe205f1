//! Configuration management command implementations

use super::effective_config;
use crate::error::CliError;
use std::path::Path;
use vpner_client::ClientConfig;

/// Print the effective configuration as TOML
pub fn show(config_path: Option<&Path>, api_url: Option<&str>) -> Result<(), CliError> {
    let path = config_path.map_or_else(ClientConfig::default_path, Path::to_path_buf);
    let config = effective_config(config_path, api_url)?;
    let rendered = toml_string(&config)?;

    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} (not found, using defaults)", path.display());
    }
    print!("{rendered}");
    Ok(())
}

/// Write the default configuration to disk
pub fn init(config_path: Option<&Path>, force: bool) -> Result<(), CliError> {
    let path = config_path.map_or_else(ClientConfig::default_path, Path::to_path_buf);
    if path.exists() && !force {
        return Err(CliError::Command(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    ClientConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn toml_string(config: &ClientConfig) -> Result<String, CliError> {
    toml::to_string_pretty(config)
        .map_err(|e| CliError::Config(format!("Failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.toml");

        init(Some(&path), false).unwrap();
        let written = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(written.poll_interval_ms, 5000);

        let err = init(Some(&path), false).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(init(Some(&path), true).is_ok());
    }

    #[test]
    fn test_rendered_config_parses_back() {
        let config = ClientConfig::default();
        let rendered = toml_string(&config).unwrap();
        assert!(rendered.contains("retry_delay_ms = 5000"));
        let parsed: ClientConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}

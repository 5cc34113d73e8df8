use anyhow::{bail, Result};
use csrc_harvest::config::{Config, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

pub fn init_config(path: PathBuf) -> Result<()> {
    let config_path = path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() {
        bail!("Configuration file already exists: {}", config_path.display());
    }

    let toml_content = format!(
        "# csrc-harvest configuration\n# Every key is optional; missing keys use the defaults below.\n\n{}",
        Config::default().to_toml_string()?
    );

    std::fs::create_dir_all(&path)?;
    std::fs::write(&config_path, toml_content)?;
    println!("Created configuration file: {}", config_path.display());

    Ok(())
}

//! Config command implementation.

use anyhow::{Context, Result, bail};

use crate::cli::ConfigAction;
use crate::config::Config;

pub fn cmd_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", Config::path().display());
        }
        ConfigAction::Show => {
            let config = Config::load();
            let content = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", content);
        }
        ConfigAction::Init { force } => {
            let path = Config::path();
            if path.exists() && !force {
                bail!(
                    "Config file already exists: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

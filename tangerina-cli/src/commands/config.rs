use anyhow::Result;
use tangerina_core::config::{self, TangerinaConfig};

use crate::commands::ConfigAction;

pub fn run_config_command(action: ConfigAction, config: TangerinaConfig) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
        }
        ConfigAction::Init => {
            let path = TangerinaConfig::default_path()?;
            if path.exists() {
                eprintln!("Config already exists at: {}", path.display());
                eprintln!("Edit it directly or delete it first.");
            } else {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, config::sample_config())?;
                eprintln!("✅ Config written to: {}", path.display());
                eprintln!("   Edit it to add your API key and pick a provider.");
            }
        }
    }
    Ok(())
}

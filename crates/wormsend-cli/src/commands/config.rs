//! Config command implementation.

use anyhow::{Context, Result};
use wormsend_core::config::{Config, CONFIG_KEYS};

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(v) => println!("{}: {}", key, v),
                None => println!("Unknown configuration key: {}", key),
            }
        }

        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("Set {} = {}", key, value);
        }

        ConfigAction::Show => {
            let config = Config::load()?;
            let rendered =
                toml_render(&config).context("Failed to render configuration")?;
            println!();
            println!("Wormsend Configuration");
            println!("{}", "─".repeat(50));
            println!();
            print!("{rendered}");
            println!();
            if std::env::var_os(wormsend_core::TOOL_PATH_ENV).is_some() {
                println!(
                    "  {} overrides tool.path: {}",
                    wormsend_core::TOOL_PATH_ENV,
                    config.tool_path().display()
                );
                println!();
            }
        }

        ConfigAction::List => {
            let config = Config::load()?;
            for key in CONFIG_KEYS {
                println!("{} = {}", key, config.get(key).unwrap_or_default());
            }
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            let config = Config::default();
            config.save()?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

/// Render every section as `key = value` lines under `[section]` headers.
fn toml_render(config: &Config) -> Option<String> {
    let mut out = String::new();
    let mut section = "";
    for key in CONFIG_KEYS {
        let (head, name) = key.split_once('.')?;
        if head != section {
            if !section.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("[{head}]\n"));
            section = head;
        }
        out.push_str(&format!("  {name} = {}\n", config.get(key)?));
    }
    Some(out)
}

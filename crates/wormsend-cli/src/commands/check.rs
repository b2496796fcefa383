//! Check command implementation.

use std::path::Path;

use anyhow::Result;
use wormsend_core::install::{InstallCheck, VersionProbe};

use super::{load_config, CheckArgs};
use crate::ui::FormState;

/// Run the check command.
///
/// Always probes the binary, whatever `tool.verify_install` says, and exits
/// non-zero when it cannot be run.
pub fn run(args: &CheckArgs) -> Result<()> {
    let config = load_config();
    let tool = args.tool.clone().unwrap_or_else(|| config.tool_path());
    let installed = VersionProbe::default().is_installed(&tool);

    if args.json {
        print_json(&tool, installed);
    } else if installed {
        println!("  magic-wormhole found at {}", tool.display());
    } else {
        eprintln!("  {}", FormState::missing_tool_description());
        eprintln!("  Looked for: {}", tool.display());
        eprintln!();
        eprintln!("  Install it with `brew install magic-wormhole` or `pipx install magic-wormhole`,");
        eprintln!("  or point wormsend at it with --tool or `wormsend config set tool.path <PATH>`.");
    }

    if installed {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn print_json(tool: &Path, installed: bool) {
    let output = serde_json::json!({
        "tool": tool.display().to_string(),
        "installed": installed,
    });
    println!("{output}");
}

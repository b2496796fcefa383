//! Shell completions generation and installation.

use std::io;
use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{bail, Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, Shell};

use super::{Cli, CompletionsAction, ShellType};

const BIN_NAME: &str = "wormsend";

impl From<ShellType> for Shell {
    fn from(shell: ShellType) -> Self {
        match shell {
            ShellType::Bash => Self::Bash,
            ShellType::Zsh => Self::Zsh,
            ShellType::Fish => Self::Fish,
            ShellType::PowerShell => Self::PowerShell,
            ShellType::Elvish => Self::Elvish,
        }
    }
}

/// Base directories completions are installed under.
#[derive(Debug, Clone)]
struct ShellDirs {
    home: PathBuf,
    data: PathBuf,
    config: PathBuf,
}

impl ShellDirs {
    /// Resolve from `$HOME`, `$XDG_DATA_HOME` and `$XDG_CONFIG_HOME`.
    fn from_env() -> Result<Self> {
        let home = env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .context("Could not determine home directory")?;
        let xdg = |var: &str, fallback: &str| {
            env::var_os(var)
                .filter(|v| !v.is_empty())
                .map_or_else(|| home.join(fallback), PathBuf::from)
        };
        Ok(Self {
            data: xdg("XDG_DATA_HOME", ".local/share"),
            config: xdg("XDG_CONFIG_HOME", ".config"),
            home,
        })
    }
}

/// Where a shell's completion script goes and how to activate it.
struct Target {
    path: PathBuf,
    enable: Vec<String>,
}

impl Target {
    fn for_shell(shell: ShellType, dirs: &ShellDirs) -> Self {
        let (path, enable) = match shell {
            ShellType::Bash => {
                let path = dirs.data.join("bash-completion/completions").join(BIN_NAME);
                let enable = vec![format!("source {}", path.display())];
                (path, enable)
            }
            ShellType::Zsh => {
                let site = dirs.data.join("zsh/site-functions");
                let enable = vec![
                    format!("fpath=({} $fpath)", site.display()),
                    "autoload -Uz compinit && compinit".to_string(),
                ];
                (site.join(format!("_{BIN_NAME}")), enable)
            }
            ShellType::Fish => {
                let path = dirs
                    .config
                    .join("fish/completions")
                    .join(format!("{BIN_NAME}.fish"));
                (path, Vec::new())
            }
            ShellType::PowerShell => {
                let path = dirs
                    .config
                    .join("powershell/completions")
                    .join(format!("{BIN_NAME}.ps1"));
                let enable = vec![format!(". {}", path.display())];
                (path, enable)
            }
            ShellType::Elvish => {
                let path = dirs.home.join(".elvish/lib").join(format!("{BIN_NAME}.elv"));
                (path, vec![format!("use {BIN_NAME}")])
            }
        };
        Self { path, enable }
    }
}

/// Run the completions command.
pub fn run(action: CompletionsAction) -> Result<()> {
    match action {
        CompletionsAction::Generate { shell } => {
            generate(
                Shell::from(shell),
                &mut Cli::command(),
                BIN_NAME,
                &mut io::stdout(),
            );
            Ok(())
        }
        CompletionsAction::Install { shell } => {
            let shell = resolve_shell(shell)?;
            let target = Target::for_shell(shell, &ShellDirs::from_env()?);
            install(shell, &target.path)?;
            println!("  Installed {shell:?} completions to {}", target.path.display());
            if target.enable.is_empty() {
                println!("  They load in new shell sessions.");
            } else {
                println!("  Add to your shell startup file:");
                for line in &target.enable {
                    println!("    {line}");
                }
            }
            Ok(())
        }
        CompletionsAction::Uninstall { shell } => {
            let shell = resolve_shell(shell)?;
            let target = Target::for_shell(shell, &ShellDirs::from_env()?);
            if uninstall(&target.path)? {
                println!("  Removed {shell:?} completions from {}", target.path.display());
            } else {
                println!("  No completions installed at {}", target.path.display());
            }
            Ok(())
        }
    }
}

fn script(shell: ShellType) -> Vec<u8> {
    let mut buf = Vec::new();
    generate(Shell::from(shell), &mut Cli::command(), BIN_NAME, &mut buf);
    buf
}

fn install(shell: ShellType, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, script(shell))
        .with_context(|| format!("Failed to write completions to: {}", path.display()))
}

/// Remove an installed script. Returns whether there was one.
fn uninstall(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove: {}", path.display()))?;
    Ok(true)
}

fn resolve_shell(shell: Option<ShellType>) -> Result<ShellType> {
    if let Some(shell) = shell {
        return Ok(shell);
    }
    let path = env::var("SHELL")
        .context("Could not detect your shell from $SHELL; pass --shell")?;
    match shell_from_path(&path) {
        Some(shell) => Ok(shell),
        None => bail!("Unsupported shell: {path} (pass --shell)"),
    }
}

fn shell_from_path(path: &str) -> Option<ShellType> {
    let name = Path::new(path).file_name()?.to_str()?.to_lowercase();
    match name.as_str() {
        "bash" => Some(ShellType::Bash),
        "zsh" => Some(ShellType::Zsh),
        "fish" => Some(ShellType::Fish),
        "pwsh" | "powershell" => Some(ShellType::PowerShell),
        "elvish" => Some(ShellType::Elvish),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirs_in(root: &Path) -> ShellDirs {
        ShellDirs {
            home: root.join("home"),
            data: root.join("data"),
            config: root.join("config"),
        }
    }

    #[test]
    fn test_script_mentions_commands() {
        let script = String::from_utf8(script(ShellType::Bash)).unwrap();
        assert!(script.contains(BIN_NAME));
        assert!(script.contains("send"));
        assert!(script.contains("check"));
    }

    #[test]
    fn test_targets_use_binary_name() {
        let dirs = dirs_in(Path::new("/x"));
        assert_eq!(
            Target::for_shell(ShellType::Zsh, &dirs).path,
            PathBuf::from("/x/data/zsh/site-functions/_wormsend")
        );
        assert_eq!(
            Target::for_shell(ShellType::Bash, &dirs).path,
            PathBuf::from("/x/data/bash-completion/completions/wormsend")
        );
        assert_eq!(
            Target::for_shell(ShellType::Fish, &dirs).path,
            PathBuf::from("/x/config/fish/completions/wormsend.fish")
        );
        assert_eq!(
            Target::for_shell(ShellType::Elvish, &dirs).enable,
            vec!["use wormsend".to_string()]
        );
    }

    #[test]
    fn test_install_then_uninstall() {
        let temp = tempfile::tempdir().unwrap();
        let target = Target::for_shell(ShellType::Zsh, &dirs_in(temp.path()));

        install(ShellType::Zsh, &target.path).unwrap();
        let written = fs::read_to_string(&target.path).unwrap();
        assert!(written.contains("#compdef wormsend"));

        assert!(uninstall(&target.path).unwrap());
        assert!(!target.path.exists());
        assert!(!uninstall(&target.path).unwrap());
    }

    #[test]
    fn test_shell_from_path() {
        assert!(matches!(shell_from_path("/bin/zsh"), Some(ShellType::Zsh)));
        assert!(matches!(shell_from_path("/usr/bin/pwsh"), Some(ShellType::PowerShell)));
        assert!(shell_from_path("/bin/tcsh").is_none());
    }
}

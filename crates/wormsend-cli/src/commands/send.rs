//! Send command implementation.
//!
//! Runs `wormhole send`, copies the code as soon as it appears and waits
//! for the receiver, rendering the form state as it changes.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;

use wormsend_core::clipboard;
use wormsend_core::config::{parse_duration, Config};
use wormsend_core::install;
use wormsend_core::receive_command;
use wormsend_core::session::SendState;
use wormsend_core::transfer::{self, SendRequest, TransferProgress, TransferReceipt};

use super::{load_config, SendArgs};
use crate::ui::{CodeBox, FormAction, FormState, SPINNER_FRAMES};

/// Run the send command.
pub async fn run(args: SendArgs) -> Result<()> {
    let config = load_config();
    let request = build_request(&args, &config)?;

    let output = Output::from_args(&args);

    let check = install::check_for(&config);
    let tool = request.tool.clone();
    let installed = tokio::task::spawn_blocking(move || check.is_installed(&tool))
        .await
        .context("Installation check failed")?;
    let mut form = FormState::new(args.paths.clone(), installed);
    if !form.tool_installed() {
        if output != Output::Json {
            eprintln!("  {}", FormState::missing_tool_description());
        }
        let missing = wormsend_core::Error::ToolNotFound(request.tool.display().to_string());
        fail(&mut form, &missing, output);
    }

    if output == Output::Normal {
        println!();
        println!("  wormsend v{}", wormsend_core::VERSION);
        println!();
        println!(
            "  {}",
            form.actions()
                .first()
                .map(FormAction::title)
                .unwrap_or_default()
        );
    }

    let pending = match transfer::send(request).await {
        Ok(pending) => pending,
        Err(e) => fail(&mut form, &e, output),
    };

    let cancel = pending.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupted, cancelling send");
            cancel.cancel();
        }
    });

    let ready = match pending.code().await {
        Ok(ready) => ready,
        Err(e) => fail(&mut form, &e, output),
    };
    let code = ready.code.as_str().to_string();

    // Kept open until the send ends; on X11 the copied text goes with it.
    let mut system_clipboard = None;
    let copied = match clipboard_text(&args, &config, &code) {
        Some(text) => {
            system_clipboard = clipboard::open_system();
            system_clipboard
                .as_deref_mut()
                .is_some_and(|c| clipboard::copy_text(c, &text))
        }
        None => false,
    };

    let toast = form.on_code(&code, copied).clone();
    match output {
        Output::Normal => {
            println!();
            CodeBox::new(&code)
                .with_receive_command(config.ui.show_receive_command)
                .display();
            println!();
            toast.display();
            println!();
        }
        Output::Quiet => println!("{code}"),
        Output::Json => {
            let event = serde_json::json!({
                "event": "code",
                "code": code,
                "receive_command": receive_command(&code),
                "copied": copied,
            });
            println!("{event}");
        }
    }

    let progress_task = (output == Output::Normal)
        .then(|| tokio::spawn(display_progress(ready.completion.progress())));

    let result = ready.completion.wait().await;

    if let Some(handle) = progress_task {
        let _ = handle.await;
    }
    ctrl_c.abort();
    drop(system_clipboard);

    match result {
        Ok(receipt) => {
            report_success(&mut form, &receipt, output);
            Ok(())
        }
        Err(e) => fail(&mut form, &e, output),
    }
}

/// How much to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Normal,
    Quiet,
    Json,
}

impl Output {
    const fn from_args(args: &SendArgs) -> Self {
        if args.json {
            Self::Json
        } else if args.quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }
}

fn build_request(args: &SendArgs, config: &Config) -> Result<SendRequest> {
    let mut request = SendRequest::from_config(args.paths.clone(), config)
        .with_code_timeout(resolve_timeout(
            args.code_timeout.as_deref(),
            config.transfer.code_timeout(),
        )?)
        .with_confirm_timeout(resolve_timeout(
            args.timeout.as_deref(),
            config.transfer.confirm_timeout(),
        )?);
    if let Some(tool) = &args.tool {
        request = request.with_tool(tool);
    }
    Ok(request)
}

/// A flag value overrides the configured timeout; `0s` disables it.
fn resolve_timeout(flag: Option<&str>, configured: Option<Duration>) -> Result<Option<Duration>> {
    let Some(value) = flag else {
        return Ok(configured);
    };
    let duration = parse_duration(value)
        .with_context(|| format!("Invalid duration: {value} (expected e.g. 30s, 5m, 1h)"))?;
    Ok((!duration.is_zero()).then_some(duration))
}

/// What to put on the clipboard for `code`, if anything.
fn clipboard_text(args: &SendArgs, config: &Config, code: &str) -> Option<String> {
    if args.no_copy || !config.ui.copy_code {
        None
    } else if args.copy_command {
        Some(receive_command(code))
    } else {
        Some(code.to_string())
    }
}

/// Spinner line while waiting for the receiver.
async fn display_progress(mut rx: watch::Receiver<TransferProgress>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let mut last_state = rx.borrow().state;
    let mut frame = 0usize;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    clear_line();
                    break;
                }
            }
            _ = ticker.tick() => {}
        }

        let progress = rx.borrow().clone();

        if progress.state != last_state {
            last_state = progress.state;
            if progress.state == SendState::ReceiverObserved {
                clear_line();
                println!(
                    "  Receiver connected {}",
                    progress.receiver.as_deref().unwrap_or_default()
                );
            }
        }

        if progress.state.is_terminal() {
            clear_line();
            break;
        }

        let status = match (progress.percent, progress.state) {
            (Some(pct), _) => format!("Sending... {pct}%"),
            (None, SendState::ReceiverObserved) => "Sending...".to_string(),
            _ => "Waiting for receiver...".to_string(),
        };
        print!("\r  {} {}   ", SPINNER_FRAMES[frame % SPINNER_FRAMES.len()], status);
        let _ = io::stdout().flush();
        frame = frame.wrapping_add(1);
    }
}

fn clear_line() {
    print!("\r{}\r", " ".repeat(60));
    let _ = io::stdout().flush();
}

fn report_success(form: &mut FormState, receipt: &TransferReceipt, output: Output) {
    let toast = form.on_confirmed(&receipt.receiver).clone();
    match output {
        Output::Normal => {
            toast.display();
            println!();
        }
        Output::Quiet => {}
        Output::Json => {
            let event = serde_json::json!({
                "event": "sent",
                "code": receipt.code.as_str(),
                "receiver": receipt.receiver,
                "name": form.filename(),
                "elapsed_secs": receipt.elapsed.as_secs_f64(),
            });
            println!("{event}");
        }
    }
}

/// Show the failure toast and exit.
fn fail(form: &mut FormState, error: &wormsend_core::Error, output: Output) -> ! {
    let toast = form.on_failed(error).clone();
    if output == Output::Json {
        println!("{}", failure_event(form, error));
    } else {
        eprintln!();
        toast.display();
        if let Some(suggestion) = error.suggestion() {
            eprintln!("       {suggestion}");
        }
        eprintln!();
    }

    let status = if matches!(error, wormsend_core::Error::Cancelled) {
        130
    } else {
        1
    };
    std::process::exit(status);
}

fn failure_event(form: &FormState, error: &wormsend_core::Error) -> serde_json::Value {
    serde_json::json!({
        "event": "failed",
        "error": error.to_string(),
        "code": error.code(),
        "name": form.filename(),
    })
}

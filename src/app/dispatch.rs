use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result, bail};
use qcompat::Config;
use qcompat::history::History;
use qcompat::relay::{self, ConsoleNotifier, Relay, SlotReader, Transport};
use qcompat::render::{RenderOutcome, RenderRequest, Renderer};
use qcompat::setup::{self, SetupOptions};
use qcompat::surface::clipboard::{ClipboardWatcher, SystemClipboard, copy_to_clipboard};
use qcompat::surface::file_watch::{FileWatchSettings, FileWatcher};
use qcompat::surface::pid_record::{PidClaim, PidRecord};
use qcompat::surface::session::{SelfLauncher, WatchMode, WatcherSupervisor};
use qcompat::surface::{FixOptions, FixOutcome, manual, scan};
use qcompat::ui::prompt::PromptSelector;
use qcompat::ui::style as ui;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn fix_options(config: &Config, dry_run: bool) -> FixOptions {
    let history = if config.history.enabled && !dry_run {
        match config.history_path() {
            Ok(path) => Some(Arc::new(History::new(path, config.history.max_entries))),
            Err(e) => {
                tracing::warn!("fix history disabled: {e:#}");
                None
            }
        }
    } else {
        None
    };
    FixOptions { dry_run, history }
}

/// Record this process as the workspace's watcher for `mode`, stopping any
/// other one first.
fn claim_watcher(config: &Config, mode: WatchMode) -> Result<PidClaim> {
    let program = std::env::current_exe()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "qcompat".to_string());
    PidRecord::new(&config.state_dir(), mode)
        .claim(&program)
        .with_context(|| format!("Failed to record the {mode} watcher"))
}

/// Cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
        }
        token.cancel();
    });
    cancel
}

fn print_outcome(path: &Path, outcome: &FixOutcome, dry_run: bool) {
    match outcome {
        FixOutcome::Fixed { imports_added, .. } => {
            let verb = if dry_run { "Would fix" } else { "Fixed" };
            println!(
                "{} {verb} {} ({})",
                ui::success("✓"),
                ui::value(path.display()),
                outcome.rule_names().join(", ")
            );
            for import in imports_added {
                println!("    {} {import}", ui::dim("+"));
            }
        }
        FixOutcome::AlreadyCompatible => println!(
            "{} {}: no changes needed",
            ui::dim("·"),
            path.display()
        ),
        FixOutcome::NoRelevantCode => println!(
            "{} {}: no Qiskit code found",
            ui::dim("·"),
            path.display()
        ),
    }
}

async fn run_fix_stdin(copy: bool) -> Result<()> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read code from stdin")?;

    let (outcome, result) = manual::fix_text(&text);
    print!("{}", result.new_text);
    eprintln!("{} {outcome}", ui::dim("qcompat:"));

    if copy && outcome.is_fixed() {
        copy_to_clipboard(&result.new_text)?;
        eprintln!("{} fixed code copied to the clipboard", ui::success("✓"));
    }
    Ok(())
}

fn run_scan(config: &Config, dir: Option<PathBuf>, dry_run: bool) {
    let root = dir.map_or_else(|| config.workspace_dir.clone(), |d| config.workspace_path(&d.to_string_lossy()));
    let report = scan::scan_workspace(&root, &config.scan, &fix_options(config, dry_run));

    for (path, rules) in &report.fixed {
        let shown = path.strip_prefix(&root).unwrap_or(path);
        let names = rules.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        println!("{} {} ({names})", ui::success("✓"), ui::value(shown.display()));
    }
    for (path, error) in &report.failed {
        println!("{} {}: {error}", ui::failure("✗"), path.display());
    }
    println!(
        "{} ({} scanned, {} failed)",
        ui::header(report.summary()),
        report.scanned,
        report.failed.len()
    );
}

async fn run_serve(config: &Config, files: bool, clipboard: bool) -> Result<()> {
    if !files && !clipboard {
        bail!("nothing to serve: enable the file watcher or pass --clipboard");
    }
    let cancel = cancel_on_ctrl_c();
    let relay = Relay::new();
    let launcher = Arc::new(SelfLauncher::new(config.workspace_dir.clone())?);
    let supervisor = WatcherSupervisor::new(launcher, relay.clone()).with_state_dir(config.state_dir());

    for (mode, enabled) in [(WatchMode::Files, files), (WatchMode::Clipboard, clipboard)] {
        if enabled {
            supervisor.start(mode).await?;
        }
    }

    // Detached watchers started from an editor task report through the slot.
    let reader = SlotReader::new(config.slot_path(), config.notify.stale_after_ms);
    let poll = Duration::from_millis(config.notify.poll_interval_ms);
    let slot_task = tokio::spawn(reader.run(relay.clone(), poll, cancel.clone()));
    let presenter = tokio::spawn(relay::present(
        relay.subscribe(),
        ConsoleNotifier::new(),
        config.notify.stale_after_ms,
        cancel.clone(),
    ));

    println!(
        "{} serving {} (Ctrl-C to stop)",
        ui::success("✓"),
        ui::value(config.workspace_dir.display())
    );
    let mut health = tokio::time::interval(Duration::from_secs(5));
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = health.tick() => {
                if supervisor.live_sessions().await == 0 {
                    tracing::warn!("all watchers have exited");
                    cancel.cancel();
                }
            }
        }
    }

    supervisor.stop_all().await;
    slot_task.await.ok();
    presenter.await.ok();
    Ok(())
}

async fn run_render(config: &Config, file: &Path, circuit: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let (source_text, working_dir) = if file == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        (text, config.workspace_dir.clone())
    } else {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let dir = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| config.workspace_dir.clone(), Path::to_path_buf);
        (text, dir)
    };

    let request = RenderRequest {
        source_text,
        output_dir: output.map_or_else(|| config.output_dir(), |d| config.workspace_path(&d.to_string_lossy())),
        working_dir: Some(working_dir),
        circuit,
    };

    let mut renderer = Renderer::from_config(config);
    if console::user_attended() {
        renderer = renderer.with_selector(Arc::new(PromptSelector));
    }

    match renderer.render(&request, &cancel_on_ctrl_c()).await {
        RenderOutcome::Done { image_path, circuit_name } => {
            println!(
                "{} drew {} to {}",
                ui::success("✓"),
                ui::accent(&circuit_name),
                ui::value(image_path.display())
            );
            Ok(())
        }
        RenderOutcome::Failed(failure) => {
            eprintln!("{} {failure}", ui::failure("✗"));
            bail!("render failed ({})", failure.kind)
        }
    }
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Fix { stdin: true, copy, .. } => run_fix_stdin(copy).await,

        Commands::Fix { file, dry_run, .. } => {
            let Some(file) = file else {
                bail!("a file or --stdin is required");
            };
            let outcome = manual::fix_file(&file, &fix_options(&config, dry_run))?;
            print_outcome(&file, &outcome, dry_run);
            Ok(())
        }

        Commands::Scan { dir, dry_run } => {
            run_scan(&config, dir, dry_run);
            Ok(())
        }

        Commands::Watch { notify } => {
            let _claim = claim_watcher(&config, WatchMode::Files)?;
            let sink = relay::sink_for(notify, config.slot_path());
            info!(workspace = %config.workspace_dir.display(), %notify, "starting file watch");
            let watcher = FileWatcher::new(
                config.workspace_dir.clone(),
                config.scan.clone(),
                FileWatchSettings::from_config(&config),
                fix_options(&config, false),
                sink,
            );
            watcher.run(cancel_on_ctrl_c()).await?;
            Ok(())
        }

        Commands::Clipboard { notify } => {
            let sink = relay::sink_for(notify, config.slot_path());
            let clipboard = SystemClipboard::open()?;
            let _claim = claim_watcher(&config, WatchMode::Clipboard)?;
            if notify != Transport::Pipe {
                println!("{} watching the clipboard (Ctrl-C to stop)", ui::success("✓"));
            }
            ClipboardWatcher::new(clipboard, sink)
                .run(Duration::from_millis(config.clipboard.interval_ms), cancel_on_ctrl_c())
                .await;
            Ok(())
        }

        Commands::Serve { no_files, clipboard } => run_serve(&config, !no_files, clipboard).await,

        Commands::Render { file, circuit, output } => run_render(&config, &file, circuit, output).await,

        Commands::Doctor => qcompat::doctor::run(&config, &CancellationToken::new()).await,

        Commands::Setup {
            yes,
            skip_install,
            no_tasks,
            example,
        } => {
            let options = SetupOptions {
                yes,
                skip_install,
                no_tasks,
                example,
            };
            setup::run(&config, options, &cancel_on_ctrl_c()).await?;
            Ok(())
        }
    }
}

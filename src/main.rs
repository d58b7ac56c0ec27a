mod app;
mod cli;
mod input;
mod k8s;
mod model;
mod server;
mod stream;
mod ui;

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use app::{App, AppCommand, PaneUpdate};
use clap::Parser;
use cli::CliArgs;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use k8s::KubeGateway;
use model::{ErrorEnvelope, render_detail};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use server::{Bridge, BridgeConfig};
use stream::{StreamSet, spawn_exec, spawn_log_tail};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const DEBUG_LOG_FILE: &str = "debug.log";

enum LogSink {
    Stderr,
    File,
    Quiet,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    if let Some(listen) = args.listen {
        init_tracing(&args.log_filter, LogSink::Stderr)?;
        let bridge = Bridge::new(BridgeConfig {
            listen,
            keyfile: args.keyfile,
            cluster: args.cluster,
            debug: args.debug,
        });
        return bridge.run().await;
    }

    // The TUI owns the terminal, so debug output goes to a file or nowhere.
    let filter = if args.debug { "debug" } else { &args.log_filter };
    let sink = if args.debug {
        LogSink::File
    } else {
        LogSink::Quiet
    };
    init_tracing(filter, sink)?;

    let gateway = KubeGateway::connect(args.cluster).await?;
    let mut app = App::new(gateway.api_host().to_string(), args.debug);
    run(&mut app, gateway).await
}

fn init_tracing(level_filter: &str, sink: LogSink) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    match sink {
        LogSink::Stderr => {
            let _ = builder.with_writer(io::stderr).try_init();
        }
        LogSink::File => {
            let file = std::fs::File::create(DEBUG_LOG_FILE)
                .with_context(|| format!("creating {DEBUG_LOG_FILE}"))?;
            let _ = builder.with_ansi(false).with_writer(Arc::new(file)).try_init();
        }
        LogSink::Quiet => {
            let _ = builder.with_writer(io::sink).try_init();
        }
    }
    Ok(())
}

async fn run(app: &mut App, gateway: KubeGateway) -> Result<()> {
    let mut terminal = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, gateway).await;
    let restore_result = restore_terminal(&mut terminal);

    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(()), Ok(())) => Ok(()),
    }
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(terminal: &mut TuiTerminal, app: &mut App, gateway: KubeGateway) -> Result<()> {
    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<PaneUpdate>();
    let mut streams = StreamSet::default();
    execute_command(
        app,
        &gateway,
        &mut streams,
        &update_tx,
        AppCommand::LoadNamespaces,
    );

    let mut reader = EventStream::new();
    let mut ticker = interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            execute_command(app, &gateway, &mut streams, &update_tx, command);
                        }
                    }
                    Some(Ok(Event::Resize(width, height))) => {
                        app.handle_resize(width, height);
                        let (cols, rows) = app.exec_pane_size();
                        streams.resize_exec(cols, rows);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        let _ = app.apply_update(PaneUpdate::Error(ErrorEnvelope::new(
                            format!("terminal event error: {error}"),
                        )));
                    }
                    None => break,
                }
            }
            maybe_update = update_rx.recv() => {
                if let Some(update) = maybe_update {
                    let command = app.apply_update(update);
                    execute_command(app, &gateway, &mut streams, &update_tx, command);
                }
            }
            _ = ticker.tick() => {
                app.tick(Instant::now());
            }
        }
    }

    streams.cancel_all();
    Ok(())
}

/// Executes a state-machine command by spawning the matching background
/// task. Results come back over the update channel; nothing here blocks the
/// input loop.
fn execute_command(
    app: &App,
    gateway: &KubeGateway,
    streams: &mut StreamSet,
    update_tx: &mpsc::UnboundedSender<PaneUpdate>,
    command: AppCommand,
) {
    match command {
        AppCommand::None | AppCommand::Quit => {}
        AppCommand::LoadNamespaces => {
            let gateway = gateway.clone();
            let tx = update_tx.clone();
            tokio::spawn(async move {
                match gateway.list_namespaces().await {
                    Ok(names) => {
                        let _ = tx.send(PaneUpdate::Namespaces(names));
                    }
                    Err(error) => {
                        let _ = tx.send(PaneUpdate::Error(ErrorEnvelope::from_error(&error)));
                    }
                }
            });
        }
        AppCommand::LoadPods { namespace } => {
            let gateway = gateway.clone();
            let tx = update_tx.clone();
            tokio::spawn(async move {
                match gateway.list_pods(&namespace).await {
                    Ok(names) => {
                        let _ = tx.send(PaneUpdate::Pods { namespace, names });
                    }
                    Err(error) => {
                        let _ = tx.send(PaneUpdate::Error(ErrorEnvelope::from_error(&error)));
                    }
                }
            });
        }
        AppCommand::SelectPod { namespace, pod } => {
            let detail_gateway = gateway.clone();
            let detail_tx = update_tx.clone();
            let detail_namespace = namespace.clone();
            let detail_pod = pod.clone();
            tokio::spawn(async move {
                match detail_gateway
                    .pod_detail(&detail_namespace, &detail_pod)
                    .await
                {
                    Ok(detail) => {
                        let _ = detail_tx.send(PaneUpdate::Detail {
                            pod: detail_pod,
                            text: render_detail(&detail),
                        });
                    }
                    Err(error) => {
                        let _ =
                            detail_tx.send(PaneUpdate::Error(ErrorEnvelope::from_error(&error)));
                    }
                }
            });

            let token = streams.begin_log();
            spawn_log_tail(gateway.clone(), namespace, pod, None, token, update_tx.clone());
        }
        AppCommand::ResolveContainers {
            namespace,
            pod,
            purpose,
        } => {
            let gateway = gateway.clone();
            let tx = update_tx.clone();
            tokio::spawn(async move {
                match gateway.pod_containers(&namespace, &pod).await {
                    Ok(choices) => {
                        let _ = tx.send(PaneUpdate::Containers {
                            namespace,
                            pod,
                            purpose,
                            choices,
                        });
                    }
                    Err(error) => {
                        let _ = tx.send(PaneUpdate::Error(ErrorEnvelope::from_error(&error)));
                    }
                }
            });
        }
        AppCommand::StartLogTail {
            namespace,
            pod,
            container,
        } => {
            let token = streams.begin_log();
            spawn_log_tail(
                gateway.clone(),
                namespace,
                pod,
                container,
                token,
                update_tx.clone(),
            );
        }
        AppCommand::StartExec {
            namespace,
            pod,
            container,
        } => {
            let handle = spawn_exec(
                gateway.clone(),
                namespace,
                pod,
                container,
                app.exec_pane_size(),
                update_tx.clone(),
            );
            streams.install_exec(handle);
        }
        AppCommand::WriteExec(bytes) => streams.write_exec(bytes),
        AppCommand::CancelStreams => streams.cancel_all(),
    }
}

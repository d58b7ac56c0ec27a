use futures::AsyncReadExt as _;
use futures::SinkExt as _;
use kube::api::TerminalSize;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::PaneUpdate;
use crate::k8s::KubeGateway;
use crate::model::ErrorEnvelope;

const LOG_POLL_INTERVAL: Duration = Duration::from_millis(200);
const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(120);

/// Re-publishes a snapshot only when it differs from the last published
/// one, so unchanged pane content never triggers a redraw.
#[derive(Debug, Default)]
pub struct SnapshotGate<T> {
    last: Option<T>,
}

impl<T: PartialEq + Clone> SnapshotGate<T> {
    pub fn admit(&mut self, snapshot: T) -> Option<T> {
        if self.last.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last = Some(snapshot.clone());
        Some(snapshot)
    }
}

/// Normalizes raw log bytes for display: lossy UTF-8 decode plus CRLF
/// collapse.
pub fn normalize_log(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).replace("\r\n", "\n")
}

/// Write/resize endpoints plus the cancellation token for one exec stream.
pub struct ExecHandle {
    pub input_tx: mpsc::UnboundedSender<Vec<u8>>,
    pub resize_tx: mpsc::UnboundedSender<(u16, u16)>,
    pub token: CancellationToken,
}

/// The set of live background streams. At most one stream of each kind is
/// active; starting a replacement cancels the previous token first and the
/// orphaned task exits at its next suspension point.
#[derive(Default)]
pub struct StreamSet {
    log: Option<CancellationToken>,
    exec: Option<ExecHandle>,
}

impl StreamSet {
    pub fn begin_log(&mut self) -> CancellationToken {
        self.cancel_log();
        let token = CancellationToken::new();
        self.log = Some(token.clone());
        token
    }

    pub fn cancel_log(&mut self) {
        if let Some(token) = self.log.take() {
            token.cancel();
        }
    }

    pub fn install_exec(&mut self, handle: ExecHandle) {
        self.cancel_exec();
        self.exec = Some(handle);
    }

    pub fn cancel_exec(&mut self) {
        if let Some(handle) = self.exec.take() {
            handle.token.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel_log();
        self.cancel_exec();
    }

    pub fn write_exec(&self, bytes: Vec<u8>) {
        if let Some(handle) = &self.exec {
            let _ = handle.input_tx.send(bytes);
        }
    }

    pub fn resize_exec(&self, cols: u16, rows: u16) {
        if let Some(handle) = &self.exec {
            let _ = handle.resize_tx.send((cols, rows));
        }
    }

    pub fn log_token(&self) -> Option<&CancellationToken> {
        self.log.as_ref()
    }

    pub fn exec_token(&self) -> Option<&CancellationToken> {
        self.exec.as_ref().map(|handle| &handle.token)
    }
}

/// Opens a follow-mode log stream and pumps it into the log pane. The
/// buffer is snapshotted on a fast poll tick and re-published only on
/// change; cancellation is observed at the next suspension point.
pub fn spawn_log_tail(
    gateway: KubeGateway,
    namespace: String,
    pod: String,
    container: Option<String>,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<PaneUpdate>,
) {
    tokio::spawn(async move {
        let stream = match gateway
            .open_log_stream(&namespace, &pod, container.as_deref())
            .await
        {
            Ok(stream) => stream,
            Err(error) => {
                let _ = tx.send(PaneUpdate::Error(ErrorEnvelope::from_error(&error)));
                return;
            }
        };
        let mut stream = Box::pin(stream);
        let _ = tx.send(PaneUpdate::LogClear);

        let mut buffer = Vec::<u8>::new();
        let mut gate = SnapshotGate::default();
        let mut ticker = interval(LOG_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut chunk = [0u8; 8192];

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("log tail cancelled for {namespace}/{pod}");
                    return;
                }
                read = stream.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                    Err(error) => {
                        let _ = tx.send(PaneUpdate::Error(ErrorEnvelope::new(format!(
                            "log stream for {namespace}/{pod} failed: {error}"
                        ))));
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if let Some(snapshot) = gate.admit(normalize_log(&buffer))
                        && tx.send(PaneUpdate::LogSnapshot(snapshot)).is_err()
                    {
                        return;
                    }
                }
            }
        }

        if let Some(snapshot) = gate.admit(normalize_log(&buffer)) {
            let _ = tx.send(PaneUpdate::LogSnapshot(snapshot));
        }
        let _ = tx.send(PaneUpdate::LogClosed);
    });
}

/// Starts an interactive exec stream against the pod and returns the
/// keystroke/resize endpoints. Output bytes feed a vt100 parser; the
/// visible screen rows are snapshotted per poll tick and re-published only
/// on change. Termination raises a one-shot `ExecStopped` update.
pub fn spawn_exec(
    gateway: KubeGateway,
    namespace: String,
    pod: String,
    container: String,
    size: (u16, u16),
    tx: mpsc::UnboundedSender<PaneUpdate>,
) -> ExecHandle {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (resize_tx, mut resize_rx) = mpsc::unbounded_channel::<(u16, u16)>();
    let token = CancellationToken::new();
    let task_token = token.clone();

    tokio::spawn(async move {
        let (cols, rows) = size;
        let mut attached = match gateway.exec_shell(&namespace, &pod, &container).await {
            Ok(attached) => attached,
            Err(error) => {
                let _ = tx.send(PaneUpdate::ExecStopped {
                    error: Some(format!(
                        "exec failed for {namespace}/{pod}: {error:#}"
                    )),
                });
                return;
            }
        };

        let Some(mut stdout) = attached.stdout() else {
            let _ = tx.send(PaneUpdate::ExecStopped {
                error: Some(format!("exec stream for {namespace}/{pod} has no output")),
            });
            return;
        };
        let Some(mut stdin) = attached.stdin() else {
            let _ = tx.send(PaneUpdate::ExecStopped {
                error: Some(format!("exec stream for {namespace}/{pod} has no input")),
            });
            return;
        };
        let mut term_tx = attached.terminal_size();
        if let Some(sender) = term_tx.as_mut() {
            let _ = sender
                .send(TerminalSize {
                    width: cols,
                    height: rows,
                })
                .await;
        }

        let mut parser = vt100::Parser::new(rows, cols, 0);
        let mut gate = SnapshotGate::default();
        let mut ticker = interval(EXEC_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut chunk = [0u8; 4096];
        let mut failure: Option<String> = None;

        loop {
            tokio::select! {
                _ = task_token.cancelled() => {
                    debug!("exec stream cancelled for {namespace}/{pod}");
                    return;
                }
                maybe_input = input_rx.recv() => match maybe_input {
                    Some(bytes) => {
                        if let Err(error) = stdin.write_all(&bytes).await {
                            failure = Some(format!("exec input failed: {error}"));
                            break;
                        }
                    }
                    None => break,
                },
                maybe_resize = resize_rx.recv() => {
                    if let Some((cols, rows)) = maybe_resize {
                        parser.set_size(rows, cols);
                        if let Some(sender) = term_tx.as_mut() {
                            let _ = sender
                                .send(TerminalSize {
                                    width: cols,
                                    height: rows,
                                })
                                .await;
                        }
                    }
                }
                read = stdout.read(&mut chunk) => match read {
                    Ok(0) => break,
                    Ok(n) => parser.process(&chunk[..n]),
                    Err(error) => {
                        failure = Some(format!("exec stream failed: {error}"));
                        break;
                    }
                },
                _ = ticker.tick() => {
                    if let Some(snapshot) = gate.admit(screen_rows(&parser))
                        && tx.send(PaneUpdate::ExecScreen(snapshot)).is_err()
                    {
                        return;
                    }
                }
            }
        }

        let failure = exec_outcome(failure, attached.join().await);
        let _ = tx.send(PaneUpdate::ExecStopped { error: failure });
    });

    ExecHandle {
        input_tx,
        resize_tx,
        token,
    }
}

/// Folds an error-status stream termination into the failure reported with
/// `ExecStopped`. A failure observed while the stream was live wins.
fn exec_outcome<E: std::fmt::Display>(
    failure: Option<String>,
    join: Result<(), E>,
) -> Option<String> {
    match join {
        Ok(()) => failure,
        Err(error) => failure.or_else(|| Some(format!("exec stream ended with error: {error}"))),
    }
}

/// Visible parser rows with trailing blank rows trimmed; the parser already
/// stripped every ANSI control and escape sequence.
fn screen_rows(parser: &vt100::Parser) -> Vec<String> {
    let screen = parser.screen();
    let (_, cols) = screen.size();
    let mut rows: Vec<String> = screen.rows(0, cols).collect();
    while rows.last().is_some_and(|row| row.trim().is_empty()) {
        rows.pop();
    }
    rows
}

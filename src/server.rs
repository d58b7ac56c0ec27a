use std::io::{Read as _, Write as _};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use russh::keys::{Algorithm, PrivateKey, load_secret_key};
use russh::server::{self, Auth, Handler, Msg, Server as _, Session};
use russh::{Channel, ChannelId, CryptoVec, Pty};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const DEFAULT_PTY_COLS: u16 = 80;
const DEFAULT_PTY_ROWS: u16 = 24;

/// Settings the bridge forwards into every dashboard subprocess.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub listen: SocketAddr,
    pub keyfile: Option<PathBuf>,
    pub cluster: bool,
    pub debug: bool,
}

/// Idempotent teardown latch. The first caller to arm it wins; every later
/// call is a no-op, so the child is killed and the channel closed exactly
/// once no matter which side disconnects first.
#[derive(Clone, Default)]
pub struct CloseOnce(Arc<AtomicBool>);

impl CloseOnce {
    pub fn arm(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Open-channel rejection text for clients requesting anything but a
/// session channel.
pub fn reject_reason(kind: &str) -> String {
    format!("unknown channel type: {kind}")
}

/// Argument list passed to the dashboard subprocess so it inherits the
/// bridge's cluster and debug settings.
pub fn dashboard_args(cluster: bool, debug: bool) -> Vec<&'static str> {
    let mut args = Vec::new();
    if cluster {
        args.push("--cluster");
    }
    if debug {
        args.push("--debug");
    }
    args
}

fn dashboard_command(config: &BridgeConfig) -> Result<CommandBuilder> {
    let exe = std::env::current_exe().context("locating current executable")?;
    let mut command = CommandBuilder::new(exe);
    for arg in dashboard_args(config.cluster, config.debug) {
        command.arg(arg);
    }
    command.env("TERM", "xterm-256color");
    Ok(command)
}

/// Loads the host key from `keyfile`, or generates an ephemeral Ed25519
/// key when none is configured.
fn host_key(keyfile: Option<&Path>) -> Result<PrivateKey> {
    match keyfile {
        Some(path) => load_secret_key(path, None)
            .with_context(|| format!("loading host key from {}", path.display())),
        None => {
            info!("no host key configured, generating an ephemeral one");
            PrivateKey::random(&mut rand_core::OsRng, Algorithm::Ed25519)
                .context("generating host key")
        }
    }
}

/// Accepts SSH connections and runs one dashboard subprocess per session,
/// attached to a pty that is bridged onto the session channel.
pub struct Bridge {
    config: BridgeConfig,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub async fn run(mut self) -> Result<()> {
        let key = host_key(self.config.keyfile.as_deref())?;
        let server_config = Arc::new(server::Config {
            keys: vec![key],
            ..server::Config::default()
        });
        let listen = self.config.listen;
        info!("listening on {listen}");
        self.run_on_address(server_config, listen)
            .await
            .with_context(|| format!("serving on {listen}"))
    }
}

impl server::Server for Bridge {
    type Handler = Connection;

    fn new_client(&mut self, peer: Option<SocketAddr>) -> Connection {
        if let Some(peer) = peer {
            info!("connection from {peer}");
        }
        Connection::new(self.config.clone())
    }

    fn handle_session_error(&mut self, error: <Self::Handler as Handler>::Error) {
        warn!("session error: {error:#}");
    }
}

/// Kills and reaps the subprocess, guarded by the teardown latch. Returns
/// the child's exit code to the caller that armed the latch; every later
/// call gets `None` and does nothing.
#[derive(Clone)]
struct Reaper {
    once: CloseOnce,
    child: Arc<Mutex<Option<Box<dyn Child + Send + Sync>>>>,
}

impl Reaper {
    fn run(&self) -> Option<u32> {
        if !self.once.arm() {
            return None;
        }
        let mut code = 0;
        if let Ok(mut slot) = self.child.lock()
            && let Some(mut child) = slot.take()
        {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => {
                    code = status.exit_code();
                    info!("dashboard exited with status {code}");
                }
                Err(error) => warn!("failed to reap dashboard: {error}"),
            }
        }
        Some(code)
    }
}

/// Per-connection handler state. The pty is opened on the shell request;
/// a pty request arriving first only records the desired size.
pub struct Connection {
    config: BridgeConfig,
    channel: Option<Channel<Msg>>,
    pending_size: Option<(u16, u16)>,
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Option<Box<dyn std::io::Write + Send>>,
    reaper: Reaper,
}

impl Connection {
    fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            channel: None,
            pending_size: None,
            master: None,
            writer: None,
            reaper: Reaper {
                once: CloseOnce::default(),
                child: Arc::new(Mutex::new(None)),
            },
        }
    }

    fn pty_size(&self) -> PtySize {
        let (cols, rows) = self
            .pending_size
            .unwrap_or((DEFAULT_PTY_COLS, DEFAULT_PTY_ROWS));
        PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    fn spawn_dashboard(&mut self, channel: ChannelId, session: &mut Session) -> Result<()> {
        let pair = native_pty_system()
            .openpty(self.pty_size())
            .context("opening pty")?;
        let command = dashboard_command(&self.config)?;
        let child = pair
            .slave
            .spawn_command(command)
            .context("spawning dashboard subprocess")?;
        if let Ok(mut slot) = self.reaper.child.lock() {
            *slot = Some(child);
        }

        let mut reader = pair
            .master
            .try_clone_reader()
            .context("cloning pty reader")?;
        self.writer = Some(pair.master.take_writer().context("taking pty writer")?);
        self.master = Some(pair.master);

        // Blocking pty reads run on the blocking pool; a forwarder task
        // pushes the output onto the session channel.
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let handle = session.handle();
        let reaper = self.reaper.clone();
        tokio::spawn(async move {
            while let Some(bytes) = rx.recv().await {
                if handle
                    .data(channel, CryptoVec::from_slice(&bytes))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            if let Some(code) = reaper.run() {
                debug!("closing channel after dashboard exit");
                let _ = handle.exit_status_request(channel, code).await;
                let _ = handle.eof(channel).await;
                let _ = handle.close(channel).await;
            }
        });
        Ok(())
    }
}

impl Handler for Connection {
    type Error = anyhow::Error;

    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        debug!("accepting connection for {user}");
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            warn!("rejecting second session channel");
            return Ok(false);
        }
        self.channel = Some(channel);
        Ok(true)
    }

    async fn channel_open_direct_tcpip(
        &mut self,
        _channel: Channel<Msg>,
        _host: &str,
        _port: u32,
        _originator: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        warn!("{}", reject_reason("direct-tcpip"));
        Ok(false)
    }

    async fn channel_open_x11(
        &mut self,
        _channel: Channel<Msg>,
        _originator: &str,
        _originator_port: u32,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        warn!("{}", reject_reason("x11"));
        Ok(false)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let cols = u16::try_from(col_width).unwrap_or(DEFAULT_PTY_COLS);
        let rows = u16::try_from(row_height).unwrap_or(DEFAULT_PTY_ROWS);
        if cols > 0 && rows > 0 {
            self.pending_size = Some((cols, rows));
        }
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        self.spawn_dashboard(channel, session)?;
        session.channel_success(channel)?;
        Ok(())
    }

    async fn exec_request(
        &mut self,
        channel: ChannelId,
        _data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        // Only interactive shells are served.
        session.channel_failure(channel)?;
        Ok(())
    }

    async fn window_change_request(
        &mut self,
        channel: ChannelId,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let cols = u16::try_from(col_width).unwrap_or(DEFAULT_PTY_COLS);
        let rows = u16::try_from(row_height).unwrap_or(DEFAULT_PTY_ROWS);
        if cols > 0
            && rows > 0
            && let Some(master) = &self.master
        {
            master
                .resize(PtySize {
                    rows,
                    cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .context("resizing pty")?;
        }
        session.channel_success(channel)?;
        Ok(())
    }

    async fn data(
        &mut self,
        _channel: ChannelId,
        data: &[u8],
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(data).context("writing to pty")?;
            writer.flush().context("flushing pty")?;
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _ = self.reaper.run();
        Ok(())
    }

    async fn channel_close(
        &mut self,
        _channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let _ = self.reaper.run();
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.reaper.run();
    }
}

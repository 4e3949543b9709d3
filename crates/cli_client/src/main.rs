//! textcast - send text to windows of a textcast host
//!
//! Inside a host window the connection details come from the environment,
//! so `textcast --all --exclude-active make` is enough. Input is cut into
//! chunks and every chunk travels as its own `SendText` request.

mod input;
mod message_reader;
mod raw_mode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use quinn::{Endpoint, SendStream};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use textcast_core::transport::{configure_client, PinnedCertVerifier, SkipVerification, SERVER_NAME};
use textcast_core::types::WINDOW_ID_ENV;
use textcast_core::{
    AuthToken, ChunkEncoder, ConnectInfo, MessageCodec, NetworkMessage, SendData, SendTextRequest,
    SessionControl, StreamMode, CHUNK_LIMIT,
};
use tokio::sync::mpsc;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::input::TimedReader;
use crate::message_reader::MessageReader;
use crate::raw_mode::RawModeGuard;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Send text, files or key presses to one or more terminal windows
#[derive(Parser, Debug)]
#[command(name = "textcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Send text to windows of a textcast host", long_about = None)]
struct Args {
    /// Windows to send to, e.g. `id:3`, `title:vim` or `index:0`
    #[arg(short = 'm', long = "match")]
    match_spec: Option<String>,

    /// Send to every window of the matching tabs
    #[arg(short = 't', long)]
    match_tab: Option<String>,

    /// Send to all windows
    #[arg(long)]
    all: bool,

    /// Never send to the active window
    #[arg(long)]
    exclude_active: bool,

    /// Read the text from standard input
    #[arg(long)]
    stdin: bool,

    /// Send the contents of a file
    #[arg(long, value_name = "PATH")]
    from_file: Option<PathBuf>,

    /// Stop reading a terminal after this many idle seconds
    #[arg(long, value_name = "SECS", requires = "stdin")]
    stdin_timeout: Option<f64>,

    /// Send a key press, e.g. `ctrl+c` or `release:shift+up`
    #[arg(long = "key", value_name = "SPEC")]
    keys: Vec<String>,

    /// Broadcast session this input belongs to
    #[arg(long, value_name = "ID")]
    session_id: Option<String>,

    /// Start or end the broadcast session instead of sending input
    #[arg(
        long,
        value_enum,
        requires = "session_id",
        conflicts_with_all = ["text", "stdin", "from_file", "keys"]
    )]
    session: Option<SessionArg>,

    /// Host address
    #[arg(long)]
    connect: Option<SocketAddr>,

    /// Host auth token (hex)
    #[arg(long)]
    token: Option<String>,

    /// SHA-256 fingerprint of the host certificate
    #[arg(long)]
    fingerprint: Option<String>,

    /// Skip certificate verification
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Text to send; words are joined with single spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    text: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SessionArg {
    Start,
    End,
}

impl From<SessionArg> for SessionControl {
    fn from(arg: SessionArg) -> Self {
        match arg {
            SessionArg::Start => SessionControl::Start,
            SessionArg::End => SessionControl::End,
        }
    }
}

impl Args {
    fn has_input(&self) -> bool {
        self.stdin || self.from_file.is_some() || !self.text.is_empty() || !self.keys.is_empty()
    }

    fn stdin_timeout(&self) -> Result<Option<Duration>> {
        self.stdin_timeout
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|_| anyhow!("Invalid --stdin-timeout: {}", secs))
            })
            .transpose()
    }
}

/// Where to connect and how to authenticate
#[derive(Debug)]
struct HostTarget {
    addr: SocketAddr,
    token: AuthToken,
    fingerprint: Option<String>,
}

type Chunks = Box<dyn Iterator<Item = textcast_core::Result<SendData>> + Send>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls CryptoProvider with ring backend (required for rustls 0.23+)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = Args::parse();
    setup_logging(&args.log_level)?;

    if args.session.is_none() && !args.has_input() {
        bail!("Nothing to send: give text, --stdin, --from-file or --key");
    }

    let target = host_target(&args, ConnectInfo::from_env())?;
    let origin = origin_window(std::env::var(WINDOW_ID_ENV).ok().as_deref());
    let timeout = args.stdin_timeout()?;

    let (endpoint, mut send, reader) = connect(&target).await?;

    let raw_guard = if args.stdin { RawModeGuard::for_stdin()? } else { None };
    let interactive = raw_guard.is_some();
    if interactive {
        eprint!("Type the text to send, Ctrl+D to finish\r\n");
    }

    let base = base_request(&args, origin, interactive);
    let chunks = chunk_source(&args, interactive, timeout)?;

    let (err_tx, mut err_rx) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(watch_replies(reader, err_tx));

    let outcome = send_chunks(&mut send, &base, chunks, &mut err_rx).await;
    drop(raw_guard);

    send_message(&mut send, &NetworkMessage::Close).await?;
    let _ = send.finish();
    if tokio::time::timeout(CLOSE_TIMEOUT, reader_task).await.is_err() {
        debug!("Host didn't acknowledge Close");
    }
    endpoint.close(0u32.into(), b"done");

    let mut errors = Vec::new();
    while let Ok(message) = err_rx.try_recv() {
        errors.push(message);
    }

    let sent = outcome?;
    debug!("Sent {} chunk(s)", sent);
    if let Some(first) = errors.first() {
        for message in &errors[1..] {
            eprintln!("Error: {}", message);
        }
        bail!("{}", first);
    }
    Ok(())
}

/// Setup logging with tracing
fn setup_logging(level: &str) -> Result<()> {
    let log_level = level.parse::<Level>().unwrap_or(Level::WARN);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}

/// Flags win over the `TEXTCAST_CONNECT` environment
fn host_target(args: &Args, env: Option<textcast_core::Result<ConnectInfo>>) -> Result<HostTarget> {
    let info = env.transpose().context("Invalid TEXTCAST_CONNECT")?;

    let addr = args
        .connect
        .or(info.as_ref().map(|i| i.addr))
        .context("No host address: pass --connect or run inside a textcast window")?;

    let token = args
        .token
        .clone()
        .or(info.as_ref().map(|i| i.token.clone()))
        .context("No auth token: pass --token")?;
    let token = AuthToken::from_hex(&token).map_err(|_| anyhow!("Invalid token"))?;

    let fingerprint = if args.insecure {
        None
    } else {
        args.fingerprint.clone().or(info.map(|i| i.fingerprint))
    };
    if fingerprint.is_none() && !args.insecure {
        bail!("No certificate fingerprint: pass --fingerprint or --insecure");
    }

    Ok(HostTarget {
        addr,
        token,
        fingerprint,
    })
}

fn origin_window(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}

fn base_request(args: &Args, origin: Option<u64>, interactive: bool) -> SendTextRequest {
    SendTextRequest {
        match_spec: args.match_spec.clone(),
        match_tab: args.match_tab.clone(),
        all: args.all,
        // The user is typing into the active window
        exclude_active: args.exclude_active || interactive,
        data: String::new(),
        session_id: args.session_id.clone().unwrap_or_default(),
        origin,
    }
}

/// Input sources in send order: stdin, file, text, keys
fn chunk_source(args: &Args, interactive: bool, timeout: Option<Duration>) -> Result<Chunks> {
    if let Some(control) = args.session {
        return Ok(Box::new(std::iter::once(Ok(SendData::Session(control.into())))));
    }

    let mut encoder = ChunkEncoder::new(CHUNK_LIMIT);
    if args.stdin {
        if interactive {
            encoder.push_stream(TimedReader::spawn(std::io::stdin(), timeout), StreamMode::Interactive);
        } else {
            encoder.push_stream(std::io::stdin(), StreamMode::Pipe);
        }
    }
    if let Some(path) = &args.from_file {
        encoder.push_file(path);
    }
    if !args.text.is_empty() {
        encoder.push_text(&args.text.join(" "))?;
    }
    encoder.push_keys(args.keys.iter().cloned());
    Ok(Box::new(encoder))
}

async fn connect(target: &HostTarget) -> Result<(Endpoint, SendStream, MessageReader)> {
    let local: SocketAddr = if target.addr.is_ipv6() {
        "[::]:0".parse()?
    } else {
        "0.0.0.0:0".parse()?
    };
    let mut endpoint = Endpoint::client(local)?;

    let client_config = match &target.fingerprint {
        Some(fp) if !fp.is_empty() => configure_client(Arc::new(PinnedCertVerifier::new(fp)))?,
        _ => {
            tracing::warn!("Certificate verification disabled");
            configure_client(Arc::new(SkipVerification))?
        }
    };
    endpoint.set_default_client_config(client_config);

    debug!("Connecting to {}", target.addr);
    let connection = endpoint
        .connect(target.addr, SERVER_NAME)?
        .await
        .with_context(|| format!("Failed to connect to {}", target.addr))?;
    let (mut send, recv) = connection.open_bi().await?;

    send_message(&mut send, &NetworkMessage::hello(Some(target.token))).await?;
    let mut reader = MessageReader::new(recv);
    match reader.read_message().await? {
        Some(NetworkMessage::Hello { .. }) => debug!("Authenticated"),
        Some(NetworkMessage::Error { message }) => bail!("{}", message),
        Some(other) => bail!("Unexpected handshake reply: {:?}", other),
        None => bail!("Host closed the stream during handshake"),
    }

    Ok((endpoint, send, reader))
}

/// Forward host errors until the host echoes Close or the stream ends
async fn watch_replies(mut reader: MessageReader, errors: mpsc::UnboundedSender<String>) {
    loop {
        match reader.read_message().await {
            Ok(Some(NetworkMessage::Error { message })) => {
                let _ = errors.send(message);
            }
            Ok(Some(NetworkMessage::Close)) | Ok(None) => break,
            Ok(Some(other)) => debug!("Ignoring {:?}", other),
            Err(e) => {
                debug!("Reply stream failed: {}", e);
                break;
            }
        }
    }
}

/// Pull one chunk, send it, repeat; stop at the first host error
async fn send_chunks(
    send: &mut SendStream,
    base: &SendTextRequest,
    mut chunks: Chunks,
    errors: &mut mpsc::UnboundedReceiver<String>,
) -> Result<usize> {
    let mut sent = 0;
    loop {
        if let Ok(message) = errors.try_recv() {
            bail!("{}", message);
        }
        // Interactive input blocks here until the user types
        let Some(data) = tokio::task::block_in_place(|| chunks.next()) else {
            break;
        };
        let data = data.context("Failed to read input")?;
        send_message(send, &NetworkMessage::SendText(base.with_data(&data))).await?;
        sent += 1;
    }
    Ok(sent)
}

async fn send_message(send: &mut SendStream, msg: &NetworkMessage) -> Result<()> {
    let buf = MessageCodec::encode(msg)?;
    send.write_all(&buf).await?;
    Ok(())
}

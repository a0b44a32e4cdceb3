use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use annotator::annotation::store::AnnotationStore;
use annotator::annotation::{AnnotationSession, LockState};
use annotator::command::{Command, Reply};
use annotator::config::Config;
use annotator::kernel::reactor::{CommandRequest, Reactor, ReactorInputs};
use annotator::kernel::scheduler::{playback_channels, PlaybackReceivers, PlaybackScheduler};

/// Replay a recorded session in real time and code behaviour on it.
#[derive(Parser, Debug)]
#[command(name = "annotator", version)]
struct Args {
    /// Recording to replay (JSON lines)
    recording: Option<PathBuf>,

    /// Annotation file to load at startup and save to
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Autosave period in seconds, 0 to disable
    #[arg(long)]
    autosave: Option<u64>,

    /// Start every category locked until the first explicit coding action
    #[arg(long)]
    locked: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(recording) = &self.recording {
            config.recording = Some(recording.clone());
        }
        if let Some(annotations) = &self.annotations {
            config.annotations = Some(annotations.clone());
        }
        if let Some(secs) = self.autosave {
            config.autosave_secs = secs;
        }
        if self.locked {
            config.default_lock = LockState::Locked;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::resolve(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut config);
    config.validate()?;

    let recording = config.recording.clone().context("no recording given")?;

    let (outputs, receivers) = playback_channels(config.channel_capacity);
    let mut scheduler = PlaybackScheduler::new(outputs);
    let (begin, end) = scheduler
        .load_file(&recording)
        .with_context(|| format!("opening recording {:?}", recording))?;
    let handle = scheduler.handle();

    let mut session = AnnotationSession::new(config.default_lock, AnnotationStore::new(config.annotations.clone()));
    session.initialize(begin, end);
    if let Some(path) = config.annotations.as_deref().filter(|p| p.exists()) {
        session
            .load(path)
            .with_context(|| format!("loading annotations {:?}", path))?;
    }

    // No renderers are attached; frames are dropped at the scheduler.
    let PlaybackReceivers { cursor, notices, payloads } = receivers;
    drop(payloads);

    let playback = scheduler.spawn()?;

    let shutdown = CancellationToken::new();
    let (command_tx, command_rx) = mpsc::channel(config.channel_capacity);
    tokio::spawn(read_commands(command_tx));
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received");
                shutdown.cancel();
            }
        });
    }

    let mut reactor = Reactor::new(session, handle.clone(), config.autosave());
    reactor
        .run(ReactorInputs { cursor, notices, commands: command_rx }, shutdown)
        .await;

    handle.stop();
    match tokio::task::spawn_blocking(move || playback.join()).await? {
        Ok(Ok(summary)) => info!("Playback summary: {:?}", summary),
        Ok(Err(e)) => warn!("Playback ended with error: {}", e),
        Err(_) => error!("Playback thread panicked"),
    }

    let mut session = reactor.into_session();
    session.save(None).context("final save")?;
    Ok(())
}

/// Reads one command per line from stdin and prints each reply as JSON.
async fn read_commands(tx: mpsc::Sender<CommandRequest>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Reading commands from stdin");

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", Reply::bad_request(e).to_line());
                continue;
            }
        };

        let (request, reply) = CommandRequest::new(command);
        if let Err(e) = tx.send(request).await {
            error!("Failed to send command: {}", e);
            break;
        }
        match reply.await {
            Ok(reply) => println!("{}", reply.to_line()),
            Err(_) => break,
        }
    }
}

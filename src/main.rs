use std::io;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use protostream::config::{load_config, AppConfig, StreamConfig};
use protostream::error::NormalizeError;
use protostream::observability::init_tracing;
use protostream::observability::token_counter::log_stream_usage;
use protostream::observability::UsageTally;
use protostream::stream::{chunk_stream, encode_frame_bytes, normalize_stream, StreamHooks};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const STDIN_READ_BYTES: usize = 8 * 1024;

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());
    let (config, using_defaults) = match load_config(&config_path) {
        Ok(config) => (config, false),
        Err(e) if e.is_not_found() => (AppConfig::default(), true),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            eprintln!("Copy 'config.example.yaml' to '{config_path}' and modify as needed.");
            std::process::exit(1);
        }
    };

    init_tracing(&config.features.log_level);
    if using_defaults {
        tracing::warn!(path = %config_path, "config file not found, using defaults");
    }

    let result = build_runtime().and_then(|runtime| runtime.block_on(run(config.stream)));
    if let Err(e) = result {
        tracing::error!("normalization failed: {e}");
        eprintln!("protostream: {e}");
        std::process::exit(1);
    }
}

fn build_runtime() -> Result<tokio::runtime::Runtime, NormalizeError> {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| NormalizeError::Internal(format!("failed to initialize Tokio runtime: {e}")))
}

async fn run(config: StreamConfig) -> Result<(), NormalizeError> {
    let started = Instant::now();
    let hooks = StreamHooks::new()
        .on_start(|| tracing::debug!("first upstream chunk received"))
        .on_completion(|reason| tracing::debug!(reason, "upstream finished"));
    let mut frames = std::pin::pin!(normalize_stream(chunk_stream(stdin_bytes()), config, hooks));

    let mut stdout = tokio::io::stdout();
    let mut tally = UsageTally::new();
    while let Some(frame) = frames.next().await {
        tally.observe(&frame);
        stdout.write_all(&encode_frame_bytes(&frame)).await?;
        stdout.flush().await?;
    }

    log_stream_usage(&tally, started.elapsed());
    Ok(())
}

fn stdin_bytes() -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    futures_util::stream::unfold(Some(tokio::io::stdin()), |stdin| async move {
        let mut stdin = stdin?;
        let mut buf = BytesMut::with_capacity(STDIN_READ_BYTES);
        match stdin.read_buf(&mut buf).await {
            Ok(0) => None,
            Ok(_) => Some((Ok(buf.freeze()), Some(stdin))),
            Err(e) => Some((Err(e), None)),
        }
    })
}

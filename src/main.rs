use instant_replay::buffer::BufferConfig;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    instant_replay::init_tracing();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => BufferConfig::from_file(&path)?,
        None => BufferConfig::default(),
    };

    instant_replay::run(config).await
}

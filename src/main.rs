use std::panic;
use std::sync::Arc;

use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::{evaluator::Evaluator, stats::StatsAggregator};
use crate::jsonl::service::JudgeService;
use crate::native::sandbox::ProcessSandbox;
use crate::storage::{questions::JsonQuestionRepository, stats_store::StatsStore};

mod config;
mod constants;
mod core;
mod jsonl;
mod native;
mod storage;

#[tokio::main]
#[tracing::instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    set_panic_hook();

    let config = Config::load()?;
    tracing::info!("Starting with {:?}", config);

    let repository = Arc::new(JsonQuestionRepository::load(&config.questions_file).await?);
    let store = StatsStore::new(&config.store_file);
    let aggregator = Arc::new(StatsAggregator::from_snapshot(store.load().await?));

    let sandbox = ProcessSandbox::new(&config.python_path, &config.work_dir)
        .with_output_limit(config.max_output_bytes);
    let evaluator = Evaluator::new(Arc::new(sandbox)).with_timeout(config.timeout());

    let service = JudgeService::start(
        repository,
        aggregator,
        evaluator,
        Some(store),
        config.channel_capacity,
    );

    tracing::info!("Reading requests from stdin");
    service
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;
    tracing::info!("Input closed, shutting down");

    Ok(())
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}

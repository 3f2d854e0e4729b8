use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use guardia_runner::{
    check::{Check, http::HttpCheck, resources::ResourceCheck},
    config::{CheckConfig, Config, read_config_file},
    hostname::SystemHostname,
    runner::{RunnerConfig, RunnerDeps, RunnerHandle, store::StatsStore},
    scheduler::{IntervalFeeder, ScheduledChecks},
    sender::{BroadcastSender, ServiceCheckEvent, StaticSenderProvider},
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init(verbosity: u8) {
    dotenv::dotenv().ok();

    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = filter::Targets::new().with_targets(vec![
        ("guardia_runner", level),
        ("runner", level),
        ("tower_http", LevelFilter::DEBUG.min(level)),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init(args.verbose);
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let (service_check_tx, service_check_rx) = broadcast::channel(256);
    tokio::spawn(log_service_checks(service_check_rx));

    let scheduled = ScheduledChecks::new();
    let runner = RunnerHandle::spawn(
        RunnerConfig {
            id: 0,
            workers: config.check_runners,
            queue_capacity: config.queue_capacity,
            logging_frequency: config.logging_frequency,
        },
        RunnerDeps {
            store: Arc::new(StatsStore::new()),
            sender_provider: Arc::new(StaticSenderProvider::new(Arc::new(
                BroadcastSender::new(service_check_tx),
            ))),
            hostname: Arc::new(SystemHostname::new(config.hostname.clone())),
            should_add_check_stats: scheduled.should_add_check_stats(),
        },
    );

    let feeder = IntervalFeeder::new(runner.clone(), scheduled);
    for check in build_checks(&config)? {
        feeder.schedule(check);
    }

    if let Some(api) = &config.api {
        let addr = guardia_runner::api::spawn_api_server(
            guardia_runner::api::ApiConfig {
                bind_addr: api.bind,
            },
            guardia_runner::api::ApiState::new(runner.clone()),
        )
        .await?;
        info!("status API available on http://{addr}/api/v1/runner");
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("shutting down");
    feeder.shutdown();
    runner.stop().await;

    Ok(())
}

fn build_checks(config: &Config) -> anyhow::Result<Vec<Arc<dyn Check>>> {
    config
        .checks
        .iter()
        .map(|check| -> anyhow::Result<Arc<dyn Check>> {
            match check {
                CheckConfig::Http(http) => Ok(Arc::new(HttpCheck::new(http.clone())?)),
                CheckConfig::Resources(resources) => {
                    Ok(Arc::new(ResourceCheck::new(resources.clone())))
                }
            }
        })
        .collect()
}

async fn log_service_checks(mut rx: broadcast::Receiver<ServiceCheckEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => debug!(
                "service check {} {:?} host={} tags={:?}",
                event.name, event.status, event.hostname, event.tags
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                error!("service check log lagged, skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

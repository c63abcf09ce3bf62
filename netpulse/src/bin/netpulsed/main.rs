/*
 *     Copyright 2025 The Netpulse Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use clap::Parser;
use netpulse::monitor::Monitor;
use netpulse::tracing::init_tracing;
use netpulse_config::netpulsed::{self, ConfigManager};
use netpulse_storage::HistoryLedger;
use netpulse_util::shutdown::shutdown_signal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};

#[derive(Debug, Parser)]
#[command(
    name = netpulsed::NAME,
    author,
    version,
    about = "netpulsed is a network throughput and latency collector",
    long_about = "A daemon that samples the throughput and latency of the host network at a fixed interval, \
    keeps a retained history of the samples and renders text or pdf reports on demand."
)]
struct Args {
    #[arg(
        short = 'c',
        long = "config",
        default_value_os_t = netpulsed::default_netpulsed_config_path(),
        help = "Specify config file to use")
    ]
    config: PathBuf,

    #[arg(
        short = 'l',
        long,
        default_value = "info",
        help = "Specify the logging level [trace, debug, info, warn, error]"
    )]
    log_level: Level,

    #[arg(
        long,
        default_value_os_t = netpulsed::default_netpulsed_log_dir(),
        help = "Specify the log directory"
    )]
    log_dir: PathBuf,

    #[arg(
        long,
        default_value_t = 24,
        help = "Specify the max number of log files"
    )]
    log_max_files: usize,

    #[arg(
        long = "verbose",
        default_value_t = false,
        help = "Specify whether to print log"
    )]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments.
    let args = Args::parse();

    // Load config, defaults are written when the file is absent.
    let config = ConfigManager::new(args.config.clone()).await?;
    let config = Arc::new(config);

    // Initialize tracing.
    let _guards = init_tracing(
        netpulsed::NAME,
        &args.log_dir,
        args.log_level,
        args.log_max_files,
        args.verbose,
    )?;

    // Load history, a damaged ledger is replaced by an empty one.
    let current = config.get().await;
    let history = match HistoryLedger::load(current.history_path()).await {
        Ok(history) => history,
        Err(err) => {
            error!("load history failed, starting empty: {}", err);
            HistoryLedger::new(current.history_path())
        }
    };

    match history.prune(current.retention_days).await {
        Ok(removed) => info!("pruned {} expired history records", removed),
        Err(err) => warn!("prune history failed: {}", err),
    }
    let history = Arc::new(history);

    // Initialize monitor.
    let monitor = Monitor::build(config.clone(), history.clone()).await;
    if current.auto_start_on_init {
        let response = monitor.start_monitoring(None).await;
        if !response.success {
            error!("auto start monitoring failed: {:?}", response.error);
        }
    }

    info!(
        "{} started with pid {}, config {}",
        netpulsed::NAME,
        std::process::id(),
        config.path().display()
    );

    // Wait for a termination signal.
    shutdown_signal().await?;
    info!("received shutdown signal");

    monitor.shutdown().await.map_err(|err| {
        error!("stop monitor failed: {}", err);
        err
    })?;

    info!("{} exited", netpulsed::NAME);
    Ok(())
}

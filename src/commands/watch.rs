//! The `watch` command: indexing passes repeated on a fixed interval.

use core::time::Duration;
use std::time::Instant;

use clap::Parser;
use theme_indexer::Result;

use crate::commands::common::{Common, CommonArgs};

/// Arguments for the watch command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run indexing passes forever, sleeping between them
pub async fn watch_index(args: &WatchArgs) -> Result<()> {
    let mut common = Common::new(&args.common)?;
    let interval = common.collector.config().scan_interval_seconds;

    loop {
        let started = Instant::now();
        let stats = common.collector.run_once().await?;
        println!("run complete: {stats} duration={}s", started.elapsed().as_secs());

        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

//! The `run` command: one indexing pass, optionally followed by a publish.

use camino::Utf8Path;
use clap::Parser;
use theme_indexer::Result;
use theme_indexer::publish::publish_artifacts;

use crate::commands::common::{Common, CommonArgs};

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Commit and push the artifacts after the run
    #[arg(long)]
    pub publish: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

/// Run a single indexing pass and write the artifacts
pub async fn run_index(args: &RunArgs) -> Result<()> {
    let mut common = Common::new(&args.common)?;

    let stats = common.collector.run_once().await?;
    println!("run complete: {stats}");

    let config = common.collector.config();
    if args.publish || config.publish_enabled {
        let paths = [config.output_path.as_path(), config.manifest_path.as_path()];
        let published = publish_artifacts(
            Utf8Path::new("."),
            &paths,
            &config.publish_commit_message,
            &config.publish_remote,
            &config.publish_branch,
        )
        .await;

        match published {
            Ok(true) => println!(
                "published artifacts to {}/{}: {}, {}",
                config.publish_remote, config.publish_branch, config.output_path, config.manifest_path
            ),
            Ok(false) => println!("publish skipped: no artifact changes"),
            Err(e) => {
                eprintln!("❌ publish failed: {e}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

use camino::Utf8PathBuf;
use clap::Parser;
use theme_indexer::Result;
use theme_indexer::config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path
    #[arg(value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub output: Utf8PathBuf,
}

pub fn init_config(args: &InitArgs) -> Result<()> {
    let config = Config::default();
    config.save(&args.output)?;
    println!("Generated default configuration file: {}", args.output);
    Ok(())
}

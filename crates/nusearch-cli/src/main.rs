//! The `nusearch` binary.

use clap::Parser;
use nusearch_cli::{CliArgs, Command, NusearchApp, NusearchConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    NusearchApp::init_logging(args.verbose, args.quiet);

    // Config commands must work without a reachable cluster or valid config.
    let app = match &args.command {
        Some(Command::Config(_)) | Some(Command::Version) | None => {
            NusearchApp::new(NusearchConfig::default())?
        }
        _ => NusearchApp::from_args(&args)?,
    };

    app.run(args).await?;
    Ok(())
}

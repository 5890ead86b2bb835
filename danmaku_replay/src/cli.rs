use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Replays a recorded host event script through the subtitle core",
    version
)]
pub struct Args {
    /// Host event script (JSON) to replay
    #[arg(long)]
    pub script: PathBuf,

    /// Subtitle config JSON (defaults apply when omitted or missing)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Label table overrides layered on the built-in tables
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Path to write the display requests and voice outcomes as JSON
    #[arg(long)]
    pub display_log_json: Option<PathBuf>,

    /// Path to write the UI scene operation log as JSON
    #[arg(long)]
    pub scene_log_json: Option<PathBuf>,

    /// Log probe and lifecycle decisions (overridden by RUST_LOG)
    #[arg(long)]
    pub verbose: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

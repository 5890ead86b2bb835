use anyhow::Result;

mod cli;
mod runtime;
mod script;

fn main() -> Result<()> {
    let args = cli::parse();
    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    runtime::execute(args)
}

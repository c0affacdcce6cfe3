use chatvault::cli::Cli;
use chatvault::logging;
use clap::Parser;

fn main() -> anyhow::Result<()> {
    logging::init_from_env()?;

    let cli = Cli::parse();
    cli.run()
}

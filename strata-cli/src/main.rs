//! strata CLI - forward-only PostgreSQL migrations.

use clap::Parser;

use strata_cli::cli::{Cli, Command};
use strata_cli::commands::{self, Context};
use strata_cli::error::CliResult;
use strata_cli::{logging, output};

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(e) = run(Cli::parse()).await {
        output::newline();
        output::error(&e.to_string());
        if let Some(hint) = e.hint() {
            output::hint(&hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let ctx = Context::load(&cli)?;

    match cli.command {
        Command::Migrate(args) => commands::migrate::run(&ctx, args).await,
        Command::Apply => commands::apply::run(&ctx).await,
        Command::Reset(args) => commands::reset::run(&ctx, args).await,
    }
}

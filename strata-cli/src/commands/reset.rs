//! `strata reset` - drop everything and rebuild from the migrations.

use strata_migrate::SeedOutcome;

use crate::cli::ResetArgs;
use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, Progress};

/// Run the reset command
pub async fn run(ctx: &Context, args: ResetArgs) -> CliResult<()> {
    output::header("Reset");
    ctx.print_targets();

    output::warn("This will drop every table, view, sequence and function and re-apply all migrations.");
    if !args.yes && !output::confirm("Are you sure you want to reset the database?") {
        output::info("Reset cancelled");
        return Ok(());
    }

    let progress = Progress::start("Resetting database");
    let report = match ctx.engine().reset().await {
        Ok(report) => report,
        Err(e) => {
            progress.fail("Reset failed");
            return Err(e.into());
        }
    };

    progress.succeed(&report.summary());
    for filename in &report.migrations.applied {
        output::list_item(filename);
    }

    match &report.seeds {
        SeedOutcome::Applied(seeds) if !seeds.applied.is_empty() => {
            output::success(&format!("Applied {} seed files", seeds.applied.len()));
        }
        SeedOutcome::Applied(_) | SeedOutcome::Skipped => {
            output::info("No seeds to apply");
        }
        SeedOutcome::Failed(reason) => {
            output::warn(&format!("Seeding failed: {}. The reset itself succeeded.", reason));
        }
    }

    Ok(())
}

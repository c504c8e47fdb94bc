//! `strata apply` - apply pending migrations.

use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, Progress};

/// Run the apply command
pub async fn run(ctx: &Context) -> CliResult<()> {
    output::header("Apply");
    ctx.print_targets();

    let progress = Progress::start("Applying migrations");
    let report = match ctx.engine().apply().await {
        Ok(report) => report,
        Err(e) => {
            progress.fail("Apply failed");
            return Err(e.into());
        }
    };

    if report.directory_missing {
        progress.info(&report.summary());
        output::warn(&format!(
            "Migrations directory {} does not exist",
            ctx.migrations.migrations_dir.display()
        ));
        return Ok(());
    }

    progress.succeed(&report.summary());
    for filename in &report.applied {
        output::list_item(filename);
    }

    Ok(())
}

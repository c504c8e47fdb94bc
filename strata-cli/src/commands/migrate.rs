//! `strata migrate` - author a migration from the declared schema and apply it.

use strata_migrate::{AuthorOptions, AuthorOutcome, MigraDiffer, ShadowWorkflow};
use strata_postgres::PgShadowProvisioner;

use crate::cli::MigrateArgs;
use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, Progress};

/// Run the migrate command
pub async fn run(ctx: &Context, args: MigrateArgs) -> CliResult<()> {
    output::header(if args.dry_run { "Migrate (dry run)" } else { "Migrate" });
    ctx.print_targets();
    output::kv("Schema files", &ctx.migrations.schema_dir.display().to_string());
    output::kv("Compared schema", &args.schema);
    output::newline();

    let shadow = ShadowWorkflow::new(
        ctx.config.shadow_config(&ctx.database_url),
        PgShadowProvisioner::new(ctx.pg.clone()),
        MigraDiffer::new(ctx.config.differ_config()),
    );
    let options = AuthorOptions {
        name: args.name,
        dry_run: args.dry_run,
        schema: args.schema,
    };

    let progress = Progress::start("Comparing declared schema with the database");
    let outcome = match ctx.engine().author(&shadow, &options).await {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.fail("Migration failed");
            return Err(e.into());
        }
    };

    match outcome {
        AuthorOutcome::NoChanges => {
            progress.succeed("No schema changes detected");
        }
        AuthorOutcome::Preview(diff) => {
            progress.info("Changes detected (dry run, nothing written)");
            output::code(&diff);
        }
        AuthorOutcome::Written { migration, applied } => {
            progress.succeed(&format!("Created {}", migration.filename));
            output::kv("File", &migration.path.display().to_string());
            output::success(&applied.summary());
            for filename in &applied.applied {
                output::list_item(filename);
            }
        }
    }

    Ok(())
}

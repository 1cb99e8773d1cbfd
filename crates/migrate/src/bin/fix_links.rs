//! Find (and optionally repair) internal links that point at moved
//! pages. The default mode only scans and reports; exit code 1 means
//! findings exist, for CI use. `--patch` rewrites the stale URLs with
//! minimal per-document patches after a short abort window; `--patch
//! --dry-run` prints the plan and writes nothing.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use serde_json::Value;

use audiofast_core::mutation::{Mutation, PatchMutation};
use audiofast_groq::{FilterExpr, Query};
use audiofast_migrate::cli::{self, MigrateArgs};
use audiofast_migrate::links::{plan_patch, PatchPlan};
use audiofast_migrate::redirects::load_redirects;
use audiofast_migrate::{tx, MigrateError, MigrationContext};

/// Document types that can carry internal links.
const DEFAULT_TYPES: &[&str] = &["brand", "review", "page"];
/// Operator abort window before live patching starts.
const GRACE: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "fix-links", about = "Scan and repair stale internal links")]
struct Args {
    /// Rewrite matches instead of only reporting them.
    #[arg(long)]
    patch: bool,

    #[command(flatten)]
    common: MigrateArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    cli::init_tracing(args.common.verbose);

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::from(cli::EXIT_FATAL)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<u8> {
    let ctx = match MigrationContext::load(&args.common) {
        Ok(ctx) => ctx,
        Err(MigrateError::MissingInput(message)) => {
            tracing::error!("{message}");
            return Ok(cli::EXIT_INPUT);
        }
        Err(e) => return Err(e.into()),
    };
    let client = match ctx.require_client() {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(cli::EXIT_INPUT);
        }
    };

    let redirects = load_redirects(client).await?;
    if redirects.is_empty() {
        tracing::info!("redirect table is empty; nothing to scan for");
        return Ok(cli::EXIT_CLEAN);
    }
    tracing::info!(redirects = redirects.len(), "redirect table loaded");

    let types: Vec<Value> = match &args.common.doc_type {
        Some(doc_type) => vec![Value::String(doc_type.clone())],
        None => DEFAULT_TYPES
            .iter()
            .map(|t| Value::String((*t).to_string()))
            .collect(),
    };
    let documents: Vec<Value> = client
        .query_built(
            Query::new()
                .filter(FilterExpr::in_values("_type", types))
                .build(),
        )
        .await?;
    tracing::info!(documents = documents.len(), "scanning document trees");

    let plans: Vec<PatchPlan> = documents
        .iter()
        .filter_map(|doc| plan_patch(doc, &redirects))
        .collect();
    let finding_count: usize = plans.iter().map(|plan| plan.findings.len()).sum();

    for plan in &plans {
        for finding in &plan.findings {
            tracing::info!(
                doc = %finding.doc_id,
                path = %finding.path,
                from = %finding.from,
                to = %finding.to,
                "stale link"
            );
        }
    }
    tracing::info!(
        documents = plans.len(),
        links = finding_count,
        "scan complete"
    );

    if !args.patch {
        // Scanner contract: findings flip the exit code for CI.
        return Ok(if plans.is_empty() {
            cli::EXIT_CLEAN
        } else {
            cli::EXIT_INPUT
        });
    }

    if plans.is_empty() {
        return Ok(cli::EXIT_CLEAN);
    }
    if ctx.dry_run {
        tracing::info!(
            documents = plans.len(),
            links = finding_count,
            "dry run: would patch these documents; nothing written"
        );
        return Ok(cli::EXIT_CLEAN);
    }

    let writer = match ctx.require_writer() {
        Ok(writer) => writer,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(cli::EXIT_INPUT);
        }
    };

    tracing::warn!(
        documents = plans.len(),
        grace_seconds = GRACE.as_secs(),
        "patching shortly; Ctrl-C now to abort"
    );
    tokio::time::sleep(GRACE).await;

    let mutations: Vec<(String, Mutation)> = plans
        .into_iter()
        .map(|plan| {
            let mutation = Mutation::Patch(PatchMutation {
                id: plan.doc_id.clone(),
                set: Some(Value::Object(plan.set)),
                ..Default::default()
            });
            (plan.doc_id, mutation)
        })
        .collect();

    let report = tx::commit_batched(writer, mutations, args.common.batch_size).await?;
    tracing::info!(patched = report.committed, failed = report.failed.len(), "patching done");
    for (doc_id, error) in report.failed {
        ctx.report.errored(doc_id, error);
    }
    ctx.finish(&args.common)?;
    Ok(cli::EXIT_CLEAN)
}

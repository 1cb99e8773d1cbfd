//! Migrate legacy reviews from a CSV export: text reviews become
//! Portable Text, PDF reviews upload their file through the asset
//! cache, external reviews keep their URL. Author names resolve from a
//! sibling `review-authors.csv` when present.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use futures::StreamExt;
use serde_json::Value;

use audiofast_client::source::DocumentSource;
use audiofast_core::mutation::{DeleteTarget, Mutation};
use audiofast_groq::FilterExpr;
use audiofast_migrate::cli::{self, MigrateArgs};
use audiofast_migrate::csvsrc::{read_csv, transform_review, AuthorRow, ReviewRow};
use audiofast_migrate::html;
use audiofast_migrate::{tx, MigrateError, MigrationContext};

const UPLOAD_POOL: usize = 3;
const AUTHORS_FILENAME: &str = "review-authors.csv";

#[derive(Parser, Debug)]
#[command(name = "migrate-reviews", about = "Migrate legacy reviews from a CSV export")]
struct Args {
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
    let Some(csv_path) = args.common.csv.clone() else {
        tracing::error!("--csv=<reviews.csv> is required");
        return Ok(cli::EXIT_INPUT);
    };
    if !args.common.has_selector() && !args.common.rollback {
        tracing::error!("refusing to run without --all, --id, --name or --limit");
        return Ok(cli::EXIT_INPUT);
    }

    let ctx = match MigrationContext::load(&args.common) {
        Ok(ctx) => ctx,
        Err(MigrateError::MissingInput(message)) => {
            tracing::error!("{message}");
            return Ok(cli::EXIT_INPUT);
        }
        Err(e) => return Err(e.into()),
    };

    if args.common.rollback {
        return rollback(&ctx, &args.common).await;
    }

    let reviews = match read_csv::<ReviewRow>(&csv_path) {
        Ok(reviews) => reviews,
        Err(MigrateError::MissingInput(message)) => {
            tracing::error!("{message}");
            return Ok(cli::EXIT_INPUT);
        }
        Err(e) => return Err(e.into()),
    };
    if reviews.skipped > 0 {
        tracing::warn!(skipped = reviews.skipped, "some review rows failed to parse");
    }
    let authors = load_authors(&csv_path);

    let existing = existing_review_ids(&ctx, &args.common).await?;
    let mut selected: Vec<ReviewRow> = Vec::new();
    for row in reviews.rows {
        if !args.common.wants_record(row.id, &row.title) {
            continue;
        }
        let target_id = format!("review-{}", row.id);
        if args.common.skip_existing && existing.contains(&target_id) {
            ctx.report.skipped(target_id, "already exists");
            continue;
        }
        selected.push(row);
        if args.common.limit.is_some_and(|limit| selected.len() >= limit) {
            break;
        }
    }
    tracing::info!(selected = selected.len(), "reviews to migrate");

    let uploader = ctx.uploader()?;
    let built: Vec<(String, ReviewRow, Result<Option<Value>, MigrateError>)> =
        futures::stream::iter(selected.into_iter().map(|row| {
            let uploader = uploader.clone();
            let authors = &authors;
            async move {
                let target_id = format!("review-{}", row.id);
                let author = row.author_id.and_then(|id| authors.get(&id)).cloned();
                let result = build_review(&row, author.as_deref(), &uploader).await;
                (target_id, row, result)
            }
        }))
        .buffer_unordered(UPLOAD_POOL)
        .collect()
        .await;

    let mut mutations: Vec<(String, Mutation)> = Vec::new();
    for (target_id, row, result) in built {
        match result {
            Ok(Some(doc)) => {
                if ctx.dry_run {
                    tracing::info!(id = %target_id, title = %row.title, "dry run: would write review");
                }
                ctx.report.created(target_id.clone(), Some(row.title));
                let mutation = if args.common.skip_existing {
                    Mutation::CreateIfNotExists(doc)
                } else {
                    Mutation::CreateOrReplace(doc)
                };
                mutations.push((target_id, mutation));
            }
            Ok(None) => ctx
                .report
                .skipped(target_id, "incomplete source row (missing PDF or URL)"),
            Err(e) => ctx.report.errored(target_id, e.to_string()),
        }
    }

    if !ctx.dry_run && !mutations.is_empty() {
        let writer = ctx.require_writer()?;
        let report = tx::commit_batched(writer, mutations, args.common.batch_size).await?;
        tracing::info!(committed = report.committed, "review documents written");
        for (doc_id, error) in report.failed {
            ctx.report.errored(doc_id, error);
        }
    }

    ctx.finish(&args.common)?;
    Ok(cli::EXIT_CLEAN)
}

async fn build_review(
    row: &ReviewRow,
    author: Option<&str>,
    uploader: &std::sync::Arc<audiofast_migrate::assets::AssetUploader>,
) -> Result<Option<Value>, MigrateError> {
    let kind = row.review_type.trim().to_ascii_lowercase();

    let pdf_asset = if kind == "pdf" {
        match row.pdf_filename.as_deref().filter(|f| !f.trim().is_empty()) {
            Some(filename) => Some(
                uploader
                    .upload_file(&format!("assets/Uploads/{filename}"))
                    .await?,
            ),
            None => None,
        }
    } else {
        None
    };

    let content = if kind == "pdf" || kind == "external" {
        Vec::new()
    } else {
        html::parse_html(&row.content_html, uploader.as_ref()).await?
    };

    Ok(transform_review(row, author, &content, pdf_asset.as_deref()))
}

fn load_authors(csv_path: &Path) -> HashMap<u64, String> {
    let authors_path: PathBuf = csv_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(AUTHORS_FILENAME);
    if !authors_path.exists() {
        tracing::warn!(path = %authors_path.display(), "no authors file; author names left unset");
        return HashMap::new();
    }
    match read_csv::<AuthorRow>(&authors_path) {
        Ok(outcome) => outcome
            .rows
            .into_iter()
            .map(|row| (row.id, row.name))
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "authors file unreadable; author names left unset");
            HashMap::new()
        }
    }
}

async fn existing_review_ids(
    ctx: &MigrationContext,
    args: &MigrateArgs,
) -> anyhow::Result<std::collections::HashSet<String>> {
    if !args.skip_existing {
        return Ok(Default::default());
    }
    let Some(client) = ctx.client.as_ref() else {
        return Ok(Default::default());
    };
    let ids = client.ids(&FilterExpr::type_is("review"), &[], None).await?;
    Ok(ids
        .into_iter()
        .map(|id| audiofast_core::document::id::base_id(&id).to_string())
        .collect())
}

async fn rollback(ctx: &MigrationContext, args: &MigrateArgs) -> anyhow::Result<u8> {
    let writer = match ctx.require_writer() {
        Ok(writer) => writer,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(cli::EXIT_INPUT);
        }
    };

    let filter = FilterExpr::and(vec![
        FilterExpr::type_is("review"),
        FilterExpr::defined("legacyId"),
    ]);
    let ids = writer.ids(&filter, &[], None).await?;
    if ids.is_empty() {
        tracing::info!("nothing to roll back");
        return Ok(cli::EXIT_CLEAN);
    }
    tracing::warn!(count = ids.len(), "rolling back migrated review documents");

    let mutations: Vec<(String, Mutation)> = ids
        .into_iter()
        .map(|id| (id.clone(), Mutation::Delete(DeleteTarget::ById { id })))
        .collect();
    let report = tx::commit_batched(writer, mutations, args.batch_size).await?;
    tracing::info!(deleted = report.committed, failed = report.failed.len(), "rollback done");
    for (doc_id, error) in report.failed {
        ctx.report.errored(doc_id, error);
    }
    ctx.finish(args)?;
    Ok(cli::EXIT_CLEAN)
}

//! Migrate legacy producer pages out of a SilverStripe SQL dump into
//! brand documents: page content becomes Portable Text, attached boxes
//! become embedded objects, and logo/banner files upload through the
//! asset cache. `--rollback` deletes everything a previous run created.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use futures::StreamExt;
use serde_json::{json, Value};

use audiofast_client::source::DocumentSource;
use audiofast_core::document::validate::validate_document;
use audiofast_core::mutation::Mutation;
use audiofast_core::portable::make_key;
use audiofast_groq::FilterExpr;
use audiofast_migrate::assets::AssetUploader;
use audiofast_migrate::cli::{self, MigrateArgs};
use audiofast_migrate::csvsrc::slugify;
use audiofast_migrate::html;
use audiofast_migrate::sqldump::{
    extract_boxes, extract_files, extract_producer_pages, extract_site_tree, BoxRecord,
    FileRecord, ProducerPageRecord, SiteTreeRecord,
};
use audiofast_migrate::{tx, MigrateError, MigrationContext};

/// Concurrent brand builds; each may trigger several asset uploads, so
/// this stays small to spare the legacy host.
const UPLOAD_POOL: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "migrate-brands", about = "Migrate legacy producer pages into brand documents")]
struct Args {
    /// Legacy SQL dump file.
    dump: std::path::PathBuf,

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

    let Ok(dump) = std::fs::read_to_string(&args.dump) else {
        tracing::error!(path = %args.dump.display(), "cannot read dump file");
        return Ok(cli::EXIT_INPUT);
    };

    let producers = extract_producer_pages(&dump);
    let site_tree = extract_site_tree(&dump);
    let files = extract_files(&dump);
    let boxes = extract_boxes(&dump);
    tracing::info!(
        producers = producers.records.len(),
        pages = site_tree.records.len(),
        files = files.records.len(),
        boxes = boxes.records.len(),
        "extracted legacy records"
    );

    let pages: HashMap<u64, SiteTreeRecord> = site_tree
        .records
        .into_iter()
        .filter(|page| page.class_name == "ProducerPage")
        .filter(|page| !(args.common.skip_homepage && page.url_segment == "home"))
        .map(|page| (page.id, page))
        .collect();
    let files: HashMap<u64, FileRecord> = files
        .records
        .into_iter()
        .map(|file| (file.id, file))
        .collect();
    let mut boxes_by_producer: HashMap<u64, Vec<BoxRecord>> = HashMap::new();
    for record in boxes.records {
        boxes_by_producer
            .entry(record.producer_page_id)
            .or_default()
            .push(record);
    }

    let existing = existing_brand_ids(&ctx, &args.common).await?;

    let mut selected: Vec<(ProducerPageRecord, SiteTreeRecord)> = Vec::new();
    for producer in producers.records {
        let Some(page) = pages.get(&producer.id) else {
            ctx.report
                .skipped(format!("producer-{}", producer.id), "no matching SiteTree row");
            continue;
        };
        if !args.common.wants_record(producer.id, &page.title) {
            continue;
        }
        let target_id = format!("brand-{}", producer.id);
        if args.common.skip_existing && existing.contains(&target_id) {
            ctx.report.skipped(target_id, "already exists");
            continue;
        }
        selected.push((producer, page.clone()));
        if args.common.limit.is_some_and(|limit| selected.len() >= limit) {
            break;
        }
    }
    tracing::info!(selected = selected.len(), "brands to migrate");

    let uploader = ctx.uploader()?;
    let built: Vec<(String, Result<Value, MigrateError>)> =
        futures::stream::iter(selected.into_iter().map(|(producer, page)| {
            let uploader = uploader.clone();
            let files = &files;
            let boxes_by_producer = &boxes_by_producer;
            async move {
                let target_id = format!("brand-{}", producer.id);
                let result = build_brand(&producer, &page, files, boxes_by_producer, &uploader).await;
                (target_id, result)
            }
        }))
        .buffer_unordered(UPLOAD_POOL)
        .collect()
        .await;

    let mut mutations: Vec<(String, Mutation)> = Vec::new();
    for (target_id, result) in built {
        match result {
            Ok(doc) => {
                let title = doc
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                if ctx.dry_run {
                    tracing::info!(id = %target_id, title = title.as_deref().unwrap_or(""), "dry run: would write brand");
                }
                ctx.report.created(target_id.clone(), title);
                let mutation = if args.common.skip_existing {
                    Mutation::CreateIfNotExists(doc)
                } else {
                    Mutation::CreateOrReplace(doc)
                };
                mutations.push((target_id, mutation));
            }
            Err(e) => ctx.report.errored(target_id, e.to_string()),
        }
    }

    if !ctx.dry_run && !mutations.is_empty() {
        let writer = ctx.require_writer()?;
        let report = tx::commit_batched(writer, mutations, args.common.batch_size).await?;
        tracing::info!(committed = report.committed, "brand documents written");
        for (doc_id, error) in report.failed {
            ctx.report.errored(doc_id, error);
        }
    }

    ctx.finish(&args.common)?;
    Ok(cli::EXIT_CLEAN)
}

async fn build_brand(
    producer: &ProducerPageRecord,
    page: &SiteTreeRecord,
    files: &HashMap<u64, FileRecord>,
    boxes_by_producer: &HashMap<u64, Vec<BoxRecord>>,
    uploader: &Arc<AssetUploader>,
) -> Result<Value, MigrateError> {
    let content = html::parse_html(&producer.content_html, uploader.as_ref()).await?;

    let mut fields = serde_json::Map::new();
    fields.insert("_id".into(), json!(format!("brand-{}", producer.id)));
    fields.insert("_type".into(), json!("brand"));
    fields.insert("title".into(), json!(page.title));
    fields.insert(
        "slug".into(),
        json!({ "_type": "slug", "current": slug_for(page) }),
    );
    fields.insert("legacyId".into(), json!(producer.id));
    fields.insert("content".into(), serde_json::to_value(content)?);

    if let Some(asset_id) = upload_from_files(producer.logo_file_id, files, uploader).await? {
        fields.insert("logo".into(), image_field(&asset_id));
    }
    if let Some(asset_id) = upload_from_files(producer.banner_file_id, files, uploader).await? {
        fields.insert("banner".into(), image_field(&asset_id));
    }

    if let Some(records) = boxes_by_producer.get(&producer.id) {
        let mut rendered = Vec::with_capacity(records.len());
        for record in records {
            let body = html::parse_html(&record.content_html, uploader.as_ref()).await?;
            let mut item = json!({
                "_key": make_key(),
                "_type": "brandBox",
                "title": record.title,
                "content": body,
            });
            if let Some(link) = &record.link {
                item["link"] = json!(link);
            }
            rendered.push(item);
        }
        fields.insert("boxes".into(), Value::Array(rendered));
    }

    let doc = Value::Object(fields);
    validate_document(&doc)?;
    Ok(doc)
}

fn slug_for(page: &SiteTreeRecord) -> String {
    if page.url_segment.is_empty() {
        slugify(&page.title)
    } else {
        page.url_segment.clone()
    }
}

fn image_field(asset_id: &str) -> Value {
    json!({ "_type": "image", "asset": { "_type": "reference", "_ref": asset_id } })
}

async fn upload_from_files(
    file_id: Option<u64>,
    files: &HashMap<u64, FileRecord>,
    uploader: &Arc<AssetUploader>,
) -> Result<Option<String>, MigrateError> {
    let Some(file_id) = file_id else {
        return Ok(None);
    };
    let Some(file) = files.get(&file_id) else {
        tracing::warn!(file_id, "referenced file row missing from dump");
        return Ok(None);
    };
    uploader.upload_image(&file.filename).await.map(Some)
}

/// Target IDs already present in the dataset, drafts collapsed.
async fn existing_brand_ids(
    ctx: &MigrationContext,
    args: &MigrateArgs,
) -> anyhow::Result<std::collections::HashSet<String>> {
    if !args.skip_existing {
        return Ok(Default::default());
    }
    let Some(client) = ctx.client.as_ref() else {
        return Ok(Default::default());
    };
    let ids = client
        .ids(&FilterExpr::type_is("brand"), &[], None)
        .await
        .context("querying existing brands")?;
    Ok(ids
        .into_iter()
        .map(|id| audiofast_core::document::id::base_id(&id).to_string())
        .collect())
}

/// Delete every brand document carrying a legacy ID (i.e. created by
/// this migration), drafts included.
async fn rollback(ctx: &MigrationContext, args: &MigrateArgs) -> anyhow::Result<u8> {
    let writer = match ctx.require_writer() {
        Ok(writer) => writer,
        Err(e) => {
            tracing::error!("{e}");
            return Ok(cli::EXIT_INPUT);
        }
    };

    let filter = FilterExpr::and(vec![
        FilterExpr::type_is("brand"),
        FilterExpr::defined("legacyId"),
    ]);
    let ids = writer.ids(&filter, &[], None).await?;
    if ids.is_empty() {
        tracing::info!("nothing to roll back");
        return Ok(cli::EXIT_CLEAN);
    }
    tracing::warn!(count = ids.len(), "rolling back migrated brand documents");

    let mutations: Vec<(String, Mutation)> = ids
        .into_iter()
        .map(|id| {
            (
                id.clone(),
                Mutation::Delete(audiofast_core::mutation::DeleteTarget::ById { id }),
            )
        })
        .collect();
    let report = tx::commit_batched(writer, mutations, args.batch_size).await?;
    tracing::info!(deleted = report.committed, failed = report.failed.len(), "rollback done");
    for (doc_id, error) in report.failed {
        ctx.report.errored(doc_id, error);
    }
    ctx.finish(args)?;
    Ok(cli::EXIT_CLEAN)
}

//! Explicit per-run state.
//!
//! All shared migration state (the client, the asset cache, the run
//! report) lives in one context object with an explicit load/save
//! lifecycle. Nothing here is a module-level singleton, so repeated or
//! interleaved runs inside one process stay independent and testable.

use std::path::Path;
use std::sync::Arc;

use audiofast_client::{SanityClient, SanityConfig};

use crate::assets::{AssetCache, AssetSink, AssetUploader, LegacyHostFetcher};
use crate::cli::MigrateArgs;
use crate::error::MigrateError;
use crate::report::MigrationReport;

const DEFAULT_CACHE_PATH: &str = ".cache/asset-uploads.json";
const DEFAULT_LEGACY_BASE: &str = "https://audiofast.pl";

pub struct MigrationContext {
    pub client: Option<SanityClient>,
    /// True when `--dry-run` was passed or no write token is present.
    pub dry_run: bool,
    pub assets: Arc<AssetCache>,
    pub report: Arc<MigrationReport>,
    pub legacy_base_url: String,
}

impl MigrationContext {
    /// Build the context from CLI flags and the environment. Missing
    /// credentials force dry-run mode; a missing project ID is fatal
    /// unless the run is explicitly a dry run.
    pub fn load(args: &MigrateArgs) -> Result<Self, MigrateError> {
        let (client, dry_run) = match SanityConfig::from_env() {
            Ok(config) => {
                let can_write = config.can_write();
                if !can_write && !args.dry_run {
                    tracing::warn!("SANITY_API_TOKEN not set; forcing dry run");
                }
                (Some(SanityClient::new(config)?), args.dry_run || !can_write)
            }
            Err(e) if args.dry_run => {
                tracing::warn!(error = %e, "no CMS configuration; running fully offline");
                (None, true)
            }
            Err(e) => {
                return Err(MigrateError::MissingInput(format!(
                    "{e} (pass --dry-run to run without CMS access)"
                )));
            }
        };

        let cache_path =
            std::env::var("ASSET_CACHE_PATH").unwrap_or_else(|_| DEFAULT_CACHE_PATH.to_string());
        let legacy_base_url =
            std::env::var("LEGACY_BASE_URL").unwrap_or_else(|_| DEFAULT_LEGACY_BASE.to_string());

        Ok(Self {
            client,
            dry_run,
            assets: Arc::new(AssetCache::load(cache_path)),
            report: Arc::new(MigrationReport::new()),
            legacy_base_url,
        })
    }

    /// The client, for paths that must talk to the store even in
    /// read-only mode (queries).
    pub fn require_client(&self) -> Result<&SanityClient, MigrateError> {
        self.client
            .as_ref()
            .ok_or_else(|| MigrateError::MissingInput("SANITY_PROJECT_ID is not set".into()))
    }

    /// The client, for mutating paths. Refuses in dry-run mode.
    pub fn require_writer(&self) -> Result<&SanityClient, MigrateError> {
        if self.dry_run {
            return Err(MigrateError::WritesDisabled(
                "dry run active (missing token or --dry-run)".into(),
            ));
        }
        self.require_client()
    }

    /// Asset uploader wired to this run's cache and mode.
    pub fn uploader(&self) -> Result<Arc<AssetUploader>, MigrateError> {
        let sink: Option<Arc<dyn AssetSink>> = match (&self.client, self.dry_run) {
            (Some(client), false) => Some(Arc::new(client.clone())),
            _ => None,
        };
        Ok(Arc::new(AssetUploader::new(
            sink,
            Arc::new(LegacyHostFetcher::new()?),
            self.assets.clone(),
            self.legacy_base_url.clone(),
            self.dry_run,
        )))
    }

    /// End-of-run bookkeeping: summary line, report file (when asked
    /// for, or whenever any record errored), and the asset cache save.
    pub fn finish(&self, args: &MigrateArgs) -> Result<(), MigrateError> {
        self.report.log_summary();
        if let Some(path) = &args.report {
            self.report.write(path)?;
        } else if self.report.has_errors() {
            self.report.write(Path::new("migration-report.json"))?;
        }
        if self.dry_run {
            tracing::info!("dry run; asset cache left untouched");
        } else {
            self.assets.save()?;
        }
        Ok(())
    }
}

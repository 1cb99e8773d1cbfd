//! Shared CLI surface for the migration binaries.

use std::path::PathBuf;

use clap::Args;
use tracing_subscriber::EnvFilter;

/// Clean completion.
pub const EXIT_CLEAN: u8 = 0;
/// Missing required input/credentials, or scanner findings exist.
pub const EXIT_INPUT: u8 = 1;
/// Unhandled fatal error.
pub const EXIT_FATAL: u8 = 2;

#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Log what would happen without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Debug-level logging.
    #[arg(long)]
    pub verbose: bool,

    /// Process at most N source records.
    #[arg(long)]
    pub limit: Option<usize>,

    /// CSV input file.
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Process only records whose title matches this name.
    #[arg(long)]
    pub name: Option<String>,

    /// Process only the record with this legacy ID.
    #[arg(long)]
    pub id: Option<u64>,

    /// Process every record (required when no other selector is given).
    #[arg(long)]
    pub all: bool,

    /// Skip records whose target document already exists.
    #[arg(long)]
    pub skip_existing: bool,

    /// Documents per write transaction.
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// Ignore records with a legacy ID below this value.
    #[arg(long)]
    pub min_id: Option<u64>,

    /// Delete the documents a previous run created instead of migrating.
    #[arg(long)]
    pub rollback: bool,

    /// Write the JSON run report here (always written on errors).
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Restrict processing to one document type.
    #[arg(long = "type")]
    pub doc_type: Option<String>,

    /// Leave the homepage record out of the run.
    #[arg(long)]
    pub skip_homepage: bool,
}

impl MigrateArgs {
    /// Record selection shared by the migrations: `--id` wins, then
    /// `--name`, then `--all`/`--limit`.
    pub fn wants_record(&self, legacy_id: u64, title: &str) -> bool {
        if let Some(min) = self.min_id {
            if legacy_id < min {
                return false;
            }
        }
        if let Some(id) = self.id {
            return legacy_id == id;
        }
        if let Some(name) = &self.name {
            return title.to_lowercase().contains(&name.to_lowercase());
        }
        true
    }

    /// A run with no selector must say `--all` explicitly.
    pub fn has_selector(&self) -> bool {
        self.all || self.id.is_some() || self.name.is_some() || self.limit.is_some()
    }
}

pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_selector_wins_over_name() {
        let args = MigrateArgs {
            id: Some(7),
            name: Some("gato".into()),
            ..Default::default()
        };
        assert!(args.wants_record(7, "Pylon"));
        assert!(!args.wants_record(8, "Gato Audio"));
    }

    #[test]
    fn min_id_filters_before_selectors() {
        let args = MigrateArgs {
            all: true,
            min_id: Some(100),
            ..Default::default()
        };
        assert!(!args.wants_record(99, "x"));
        assert!(args.wants_record(100, "x"));
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        let args = MigrateArgs {
            name: Some("GATO".into()),
            ..Default::default()
        };
        assert!(args.wants_record(1, "Gato Audio"));
        assert!(!args.wants_record(1, "Pylon"));
    }
}

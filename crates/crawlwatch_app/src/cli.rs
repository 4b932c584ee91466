use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crawlwatch_core::{FilterState, SortColumn, SortOrder, TargetId};

use crate::config::DEFAULT_CONFIG_FILE;

#[derive(Debug, Parser)]
#[command(name = "crawlwatch", version, about = "Monitor and control crawl jobs")]
pub struct Cli {
    /// RON configuration file; defaults apply when it does not exist.
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print one page of the target listing.
    List(ListingArgs),
    /// Print the listing and reprint it whenever the server reports a change.
    Watch(ListingArgs),
    /// Start crawls.
    Start(ActionArgs),
    /// Stop running crawls.
    Stop(ActionArgs),
    /// Delete targets.
    Delete(ActionArgs),
    /// Register a new target URL.
    Add {
        url: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ListingArgs {
    /// Server-side search text.
    #[arg(long, short)]
    pub query: Option<String>,
    /// Column to sort by, e.g. `domain` or `h1_count`.
    #[arg(long, short)]
    pub sort: Option<SortColumn>,
    /// Sort descending instead of ascending.
    #[arg(long)]
    pub desc: bool,
    #[arg(long, short, default_value_t = 1)]
    pub page: u32,
    /// Rows per page; overrides the config file.
    #[arg(long)]
    pub page_size: Option<u32>,
}

impl ListingArgs {
    pub fn apply(&self, base: FilterState) -> FilterState {
        let mut filter = match self.page_size {
            Some(size) => base.with_page_size_changed(size),
            None => base,
        };
        if let Some(query) = &self.query {
            filter = filter.with_query(query);
        }
        if let Some(column) = self.sort {
            filter = filter.sorted_by(column);
            if self.desc {
                filter = filter.with_order(SortOrder::Desc);
            }
        }
        filter.with_page(self.page)
    }
}

#[derive(Debug, Clone, Args)]
pub struct ActionArgs {
    /// Target ids, applied in the order given.
    #[arg(required_unless_present = "visible")]
    pub ids: Vec<String>,
    /// Apply to every target on the selected listing page instead.
    #[arg(long, conflicts_with = "ids")]
    pub visible: bool,
    #[command(flatten)]
    pub listing: ListingArgs,
}

impl ActionArgs {
    pub fn target_ids(&self) -> Vec<TargetId> {
        self.ids.iter().map(|id| TargetId::new(id.trim())).collect()
    }
}

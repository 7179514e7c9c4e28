use anyhow::Result;
use log::debug;

use crate::provider::{ModCatalog, SearchFilters, SortOrder};

#[derive(clap::Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Search string
    pub query: Option<String>,

    /// Filter by tag
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Sort order of the results
    #[arg(short = 's', long, value_name = "ORDER", default_value = "top",
          value_parser = ["top", "alpha", "updated"])]
    pub sort: String,

    /// Show at most this many results
    #[arg(short = 'l', long)]
    pub limit: Option<usize>,
}

/// Search the mod catalog
#[tracing::instrument(skip(catalog))]
pub async fn search<C: ModCatalog + ?Sized>(catalog: &C, args: &SearchArgs) -> Result<()> {
    let filters = SearchFilters {
        tags: args.tags.clone(),
        order: args.sort.parse::<SortOrder>()?,
        limit: args.limit,
    };
    let query = args.query.as_deref().unwrap_or("");
    let results = catalog.search(query, &filters).await?;
    debug!("{} result(s) for {:?}", results.len(), query);

    if results.is_empty() {
        println!("No mods found.");
    }
    for result in results {
        println!("{}\n    {}\n", result.name, result.summary.replace('\n', " "));
    }
    Ok(())
}

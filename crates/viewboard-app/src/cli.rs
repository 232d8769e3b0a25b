use clap::{Args, Parser, Subcommand};

use viewboard_core::date::DateSide;
use viewboard_core::error::DateRangeError;
use viewboard_core::filter::{FilterKind, ALL_SENTINEL};
use viewboard_core::store::FilterStore;

#[derive(Debug, Parser)]
#[command(name = "viewboard", version, about = "Placement analytics dashboard client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a filter selection and fetch its analytics once.
    Fetch(FetchArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct FetchArgs {
    /// Brand to filter by; repeat for several. Replaces the default brands.
    #[arg(long = "brand", value_name = "NAME")]
    pub brands: Vec<String>,

    /// Product to filter by; repeat for several. Replaces the default products.
    #[arg(long = "product", value_name = "NAME")]
    pub products: Vec<String>,

    /// Match every brand.
    #[arg(long, conflicts_with = "brands")]
    pub all_brands: bool,

    /// Match every product.
    #[arg(long, conflicts_with = "products")]
    pub all_products: bool,

    /// Period start, YYYY-MM-DD.
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// Period end, YYYY-MM-DD.
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Print the raw JSON payload instead of a summary.
    #[arg(long)]
    pub json: bool,
}

impl FetchArgs {
    /// Drive the store the way the dashboard UI would, without applying.
    pub fn select(&self, store: &mut FilterStore) -> Result<(), DateRangeError> {
        select_kind(store, FilterKind::Brand, self.all_brands, &self.brands);
        select_kind(store, FilterKind::Product, self.all_products, &self.products);

        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            store.set_draft_date(DateSide::Start, start.as_str());
            store.set_draft_date(DateSide::End, end.as_str());
            store.commit_date_range()?;
        }
        Ok(())
    }
}

fn select_kind(store: &mut FilterStore, kind: FilterKind, all: bool, items: &[String]) {
    if !all && items.is_empty() {
        return;
    }
    store.toggle_item(kind, ALL_SENTINEL);
    for item in items {
        if !store.pending().contains(kind, item) {
            store.toggle_item(kind, item);
        }
    }
}

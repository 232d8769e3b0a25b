//! Brand/product filter selections and the cache key derived from them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Checkbox label that resets a section to "no filter".
pub const ALL_SENTINEL: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Brand,
    Product,
}

impl FilterKind {
    /// Query parameter name used by the analytics endpoint.
    pub fn param(self) -> &'static str {
        match self {
            FilterKind::Brand => "brands",
            FilterKind::Product => "products",
        }
    }
}

/// A set of brands and products. An empty set matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub brands: BTreeSet<String>,
    pub products: BTreeSet<String>,
}

impl FilterSelection {
    pub fn new<B, P>(brands: B, products: P) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            brands: brands.into_iter().map(Into::into).collect(),
            products: products.into_iter().map(Into::into).collect(),
        }
    }

    pub fn items(&self, kind: FilterKind) -> &BTreeSet<String> {
        match kind {
            FilterKind::Brand => &self.brands,
            FilterKind::Product => &self.products,
        }
    }

    pub(crate) fn items_mut(&mut self, kind: FilterKind) -> &mut BTreeSet<String> {
        match kind {
            FilterKind::Brand => &mut self.brands,
            FilterKind::Product => &mut self.products,
        }
    }

    pub fn contains(&self, kind: FilterKind, item: &str) -> bool {
        self.items(kind).contains(item)
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty() && self.products.is_empty()
    }
}

/// The selection locked in by the last Apply.
///
/// Only [`crate::store::FilterStore`] produces new values, so the committed
/// snapshot can never be observed half-updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedFilters(FilterSelection);

impl AppliedFilters {
    pub(crate) fn from_selection(selection: FilterSelection) -> Self {
        Self(selection)
    }

    pub fn brands(&self) -> &BTreeSet<String> {
        &self.0.brands
    }

    pub fn products(&self) -> &BTreeSet<String> {
        &self.0.products
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.0
    }

    pub fn query_key(&self) -> QueryKey {
        QueryKey::from(self)
    }
}

/// Canonical identity of an applied filter set.
///
/// Members are sorted and de-duplicated, so two sets with the same content
/// always produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryKey {
    brands: Vec<String>,
    products: Vec<String>,
}

impl QueryKey {
    pub fn new<B, P>(brands: B, products: P) -> Self
    where
        B: IntoIterator,
        B::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        let brands: BTreeSet<String> = brands.into_iter().map(Into::into).collect();
        let products: BTreeSet<String> = products.into_iter().map(Into::into).collect();
        Self {
            brands: brands.into_iter().collect(),
            products: products.into_iter().collect(),
        }
    }

    pub fn brands(&self) -> &[String] {
        &self.brands
    }

    pub fn products(&self) -> &[String] {
        &self.products
    }

    /// `(name, value)` pairs with one entry per set member, brands first.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let brands = self
            .brands
            .iter()
            .map(|b| (FilterKind::Brand.param(), b.as_str()));
        let products = self
            .products
            .iter()
            .map(|p| (FilterKind::Product.param(), p.as_str()));
        brands.chain(products).collect()
    }
}

impl From<&AppliedFilters> for QueryKey {
    fn from(applied: &AppliedFilters) -> Self {
        // BTreeSet iteration is already sorted and unique.
        Self {
            brands: applied.brands().iter().cloned().collect(),
            products: applied.products().iter().cloned().collect(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "analytics?brands={}&products={}",
            self.brands.join(","),
            self.products.join(",")
        )
    }
}

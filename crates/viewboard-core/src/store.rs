//! Filter State Store: pending and applied selections, the date draft and
//! the open/closed state of the filter UI.
//!
//! Every transition takes `&mut self` and completes before returning, so a
//! caller never observes a half-applied change. No I/O happens here; the
//! query cache reads [`FilterStore::applied`] after [`FilterStore::apply`].

use serde::{Deserialize, Serialize};

use crate::date::{navigate_month, DateRange, DateSide, DraftDateRange, MonthDirection};
use crate::error::{CoreError, DateRangeError};
use crate::filter::{AppliedFilters, FilterKind, FilterSelection, ALL_SENTINEL};

/// Brands and products the dashboard offers as checkboxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub brands: Vec<String>,
    pub products: Vec<String>,
}

impl Catalog {
    pub fn items(&self, kind: FilterKind) -> &[String] {
        match kind {
            FilterKind::Brand => &self.brands,
            FilterKind::Product => &self.products,
        }
    }
}

/// Values the store starts from, supplied by the composition root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDefaults {
    pub brands: Vec<String>,
    pub products: Vec<String>,
    /// Month shown when the date picker first opens, e.g. `"July 2025"`.
    pub initial_month: String,
    pub catalog: Catalog,
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            brands: vec!["Koenig".to_string()],
            products: vec!["Airfryer".to_string()],
            initial_month: "July 2025".to_string(),
            catalog: Catalog {
                brands: vec!["Koenig".to_string(), "Turmix".to_string()],
                products: vec!["Airfryer".to_string()],
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiPanel {
    Dropdown,
    BrandSection,
    ProductSection,
    DateModal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UiState {
    pub dropdown_open: bool,
    pub brand_section_open: bool,
    pub product_section_open: bool,
    pub date_modal_open: bool,
}

impl Default for UiState {
    fn default() -> Self {
        // The brand section starts expanded so the first choice is visible.
        Self {
            dropdown_open: false,
            brand_section_open: true,
            product_section_open: false,
            date_modal_open: false,
        }
    }
}

impl UiState {
    pub fn is_open(&self, panel: UiPanel) -> bool {
        *self.flag(panel)
    }

    fn flag(&self, panel: UiPanel) -> &bool {
        match panel {
            UiPanel::Dropdown => &self.dropdown_open,
            UiPanel::BrandSection => &self.brand_section_open,
            UiPanel::ProductSection => &self.product_section_open,
            UiPanel::DateModal => &self.date_modal_open,
        }
    }

    fn flag_mut(&mut self, panel: UiPanel) -> &mut bool {
        match panel {
            UiPanel::Dropdown => &mut self.dropdown_open,
            UiPanel::BrandSection => &mut self.brand_section_open,
            UiPanel::ProductSection => &mut self.product_section_open,
            UiPanel::DateModal => &mut self.date_modal_open,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterStore {
    catalog: Catalog,
    pending: FilterSelection,
    applied: AppliedFilters,
    draft_dates: DraftDateRange,
    date_range: DateRange,
    current_month: String,
    ui: UiState,
}

impl FilterStore {
    /// Pending and applied selections both start at the configured defaults.
    pub fn new(defaults: FilterDefaults) -> Self {
        let selection = FilterSelection::new(defaults.brands, defaults.products);
        Self {
            catalog: defaults.catalog,
            applied: AppliedFilters::from_selection(selection.clone()),
            pending: selection,
            draft_dates: DraftDateRange::default(),
            date_range: DateRange::default(),
            current_month: defaults.initial_month,
            ui: UiState::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pending(&self) -> &FilterSelection {
        &self.pending
    }

    pub fn applied(&self) -> &AppliedFilters {
        &self.applied
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// `true` when the pending set for `kind` is empty, i.e. matches everything.
    pub fn is_all_selected(&self, kind: FilterKind) -> bool {
        self.pending.items(kind).is_empty()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending != *self.applied.selection()
    }

    // ---- filter transitions ----

    /// Flip membership of `item`; the [`ALL_SENTINEL`] clears the set instead.
    pub fn toggle_item(&mut self, kind: FilterKind, item: &str) {
        let items = self.pending.items_mut(kind);
        if item == ALL_SENTINEL {
            items.clear();
        } else if !items.remove(item) {
            items.insert(item.to_string());
        }
    }

    pub fn remove_item(&mut self, kind: FilterKind, item: &str) {
        self.pending.items_mut(kind).remove(item);
    }

    pub fn clear_all(&mut self) {
        self.pending.brands.clear();
        self.pending.products.clear();
    }

    /// Commit the pending selection. The applied value is an independent copy.
    pub fn apply(&mut self) -> &AppliedFilters {
        self.applied = AppliedFilters::from_selection(self.pending.clone());
        &self.applied
    }

    // ---- dates ----

    pub fn draft_dates(&self) -> &DraftDateRange {
        &self.draft_dates
    }

    /// The last committed date range; empty until one is committed.
    pub fn date_range(&self) -> DateRange {
        self.date_range
    }

    pub fn set_draft_date(&mut self, side: DateSide, value: impl Into<String>) {
        self.draft_dates.set(side, value);
    }

    /// Validate the draft and commit it, closing the date modal.
    ///
    /// On error nothing changes and the modal stays open so the user can
    /// correct the input.
    pub fn commit_date_range(&mut self) -> Result<DateRange, DateRangeError> {
        let range = self.draft_dates.to_range()?;
        self.date_range = range;
        self.ui.date_modal_open = false;
        Ok(range)
    }

    pub fn current_month(&self) -> &str {
        &self.current_month
    }

    pub fn set_current_month(&mut self, label: impl Into<String>) {
        self.current_month = label.into();
    }

    pub fn navigate_month(&mut self, direction: MonthDirection) -> Result<&str, CoreError> {
        self.current_month = navigate_month(&self.current_month, direction)?;
        Ok(&self.current_month)
    }

    // ---- UI panels ----

    pub fn toggle(&mut self, panel: UiPanel) {
        let flag = self.ui.flag_mut(panel);
        *flag = !*flag;
    }

    pub fn open(&mut self, panel: UiPanel) {
        *self.ui.flag_mut(panel) = true;
    }

    pub fn close(&mut self, panel: UiPanel) {
        *self.ui.flag_mut(panel) = false;
    }

    pub fn is_open(&self, panel: UiPanel) -> bool {
        self.ui.is_open(panel)
    }

    /// The view saw a pointer event outside the filter dropdown.
    pub fn handle_outside_interaction(&mut self) {
        self.close(UiPanel::Dropdown);
    }
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new(FilterDefaults::default())
    }
}

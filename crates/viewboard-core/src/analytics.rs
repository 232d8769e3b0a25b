//! Wire types returned by the analytics endpoint.

use serde::{Deserialize, Serialize};

/// Aggregate view counts for one applied filter set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub total_views: u64,
    pub breakdown: ChannelBreakdown,
    pub placements: Vec<PlacementCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBreakdown {
    pub retail: u64,
    pub search: u64,
    pub social: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementCategory {
    pub category: String,
    pub items: Vec<PlacementItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementItem {
    pub name: String,
    pub views: u64,
}

impl AnalyticsData {
    /// Sum of views across every placement item.
    pub fn placement_views(&self) -> u64 {
        self.placements
            .iter()
            .flat_map(|category| category.items.iter())
            .map(|item| item.views)
            .sum()
    }
}

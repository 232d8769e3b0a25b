use viewboard_core::analytics::AnalyticsData;
use viewboard_core::date::DateRange;
use viewboard_core::filter::AppliedFilters;
use viewboard_core::format::format_views;

/// Plain-text rendering of one analytics result.
pub fn render_summary(filters: &AppliedFilters, range: DateRange, data: &AnalyticsData) -> String {
    let mut out = format!(
        "Brands:   {}\nProducts: {}\n",
        describe(filters.brands().iter()),
        describe(filters.products().iter())
    );
    if let (Some(start), Some(end)) = (range.start, range.end) {
        out.push_str(&format!("Period:   {start} to {end}\n"));
    }
    out.push_str(&format!(
        "\nTotal views: {}\n  retail {}  search {}  social {}\n",
        format_views(data.total_views),
        format_views(data.breakdown.retail),
        format_views(data.breakdown.search),
        format_views(data.breakdown.social)
    ));
    for category in &data.placements {
        out.push_str(&format!("\n{}\n", category.category));
        for item in &category.items {
            out.push_str(&format!(
                "  {:<60} {:>12}\n",
                item.name,
                format_views(item.views)
            ));
        }
    }
    out
}

fn describe<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let items: Vec<&str> = items.map(String::as_str).collect();
    if items.is_empty() {
        "All".to_string()
    } else {
        items.join(", ")
    }
}

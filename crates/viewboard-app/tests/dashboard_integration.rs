use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use viewboard_app::dashboard::Dashboard;
use viewboard_core::config::Config;
use viewboard_core::filter::{FilterKind, ALL_SENTINEL};
use viewboard_core::store::FilterDefaults;
use viewboard_query::QueryStatus;

/// Stub endpoint reproducing the placement multiplier contract:
/// every figure scales by `max(1, brands_or_1 * products_or_1)`.
#[derive(Default)]
struct Stub {
    hits: AtomicUsize,
    queries: Mutex<Vec<Vec<(String, String)>>>,
    /// Requests still to be rejected with 400 before answering normally.
    rejections: AtomicUsize,
}

fn payload(m: u64) -> Value {
    let item = |name: &str| json!({ "name": name, "views": 300 * m });
    json!({
        "totalViews": 19_398_123 * m,
        "breakdown": { "retail": 123 * m, "search": 123 * m, "social": 123 * m },
        "placements": [
            { "category": "Retail", "items": [
                item("Interdiscount (direct expeerly integration)"),
                item("Galaxus (Youtube integration)")
            ] },
            { "category": "Search", "items": [ item("Youtube Search"), item("Expeerly.com") ] },
            { "category": "Social", "items": [ item("Tiktok"), item("Instagram") ] }
        ]
    })
}

async fn analytics(
    State(stub): State<Arc<Stub>>,
    Query(params): Query<Vec<(String, String)>>,
) -> impl IntoResponse {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    let brands = params.iter().filter(|(k, _)| k == "brands").count() as u64;
    let products = params.iter().filter(|(k, _)| k == "products").count() as u64;
    stub.queries.lock().push(params);
    let rejecting = stub
        .rejections
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if rejecting {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid query parameters" })),
        );
    }
    let m = (brands.max(1) * products.max(1)).max(1);
    (StatusCode::OK, Json(payload(m)))
}

async fn spawn_stub() -> (SocketAddr, Arc<Stub>) {
    let stub = Arc::new(Stub::default());
    let app = Router::new()
        .route("/analytics", get(analytics))
        .with_state(Arc::clone(&stub));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (addr, stub)
}

fn test_config(addr: SocketAddr) -> Config {
    Config {
        analytics_url: format!("http://{addr}/analytics"),
        defaults: FilterDefaults {
            brands: vec![],
            products: vec![],
            ..FilterDefaults::default()
        },
        ..Config::default()
    }
}

// ============================================================
// BDD: one brand, no product filter → multiplier 1
// ============================================================
#[tokio::test]
async fn single_brand_yields_base_figures() {
    let (addr, stub) = spawn_stub().await;
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    dashboard.store_mut().toggle_item(FilterKind::Brand, "Koenig");
    dashboard.apply();
    let data = dashboard.refresh().await.expect("analytics");

    assert_eq!(data.total_views, 19_398_123);
    assert_eq!(data.breakdown.retail, 123);
    assert!(data
        .placements
        .iter()
        .flat_map(|c| c.items.iter())
        .all(|item| item.views == 300));
    assert_eq!(
        stub.queries.lock().as_slice(),
        [vec![("brands".to_string(), "Koenig".to_string())]]
    );
}

// ============================================================
// BDD: two brands and one product → every figure doubles
// ============================================================
#[tokio::test]
async fn two_brands_one_product_double_every_figure() {
    let (addr, _stub) = spawn_stub().await;
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    let store = dashboard.store_mut();
    store.toggle_item(FilterKind::Brand, "Turmix");
    store.toggle_item(FilterKind::Brand, "Koenig");
    store.toggle_item(FilterKind::Product, "Airfryer");
    dashboard.apply();
    let data = dashboard.refresh().await.expect("analytics");

    assert_eq!(data.total_views, 2 * 19_398_123);
    assert_eq!(data.breakdown.retail, 246);
    assert_eq!(data.breakdown.search, 246);
    assert_eq!(data.breakdown.social, 246);
    assert!(data
        .placements
        .iter()
        .flat_map(|c| c.items.iter())
        .all(|item| item.views == 600));
}

// ============================================================
// BDD: pending edits never reach the endpoint
// ============================================================
#[tokio::test]
async fn pending_selection_is_not_fetched_until_applied() {
    let (addr, stub) = spawn_stub().await;
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    dashboard.store_mut().toggle_item(FilterKind::Brand, "Koenig");
    dashboard.apply();
    dashboard.refresh().await.expect("first");

    dashboard.store_mut().toggle_item(FilterKind::Brand, "Turmix");
    dashboard.store_mut().toggle_item(FilterKind::Product, "Airfryer");
    let snapshot = dashboard.analytics();
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(
        snapshot.data.as_ref().map(|d| d.total_views),
        Some(19_398_123)
    );
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
}

// ============================================================
// BDD: re-applying an unchanged selection is served from cache
// ============================================================
#[tokio::test]
async fn reapplying_same_selection_hits_the_cache() {
    let (addr, stub) = spawn_stub().await;
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    dashboard.store_mut().toggle_item(FilterKind::Brand, "Koenig");
    dashboard.apply();
    dashboard.refresh().await.expect("first");

    // Round-trip through a different selection and back.
    dashboard.store_mut().toggle_item(FilterKind::Brand, ALL_SENTINEL);
    dashboard.apply();
    dashboard.refresh().await.expect("all brands");
    dashboard.store_mut().toggle_item(FilterKind::Brand, "Koenig");
    let snapshot = dashboard.apply();

    assert_eq!(snapshot.status, QueryStatus::Success);
    assert!(!snapshot.is_fetching);
    assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
}

// ============================================================
// BDD: apply snapshot shows loading then data to a subscriber
// ============================================================
#[tokio::test]
async fn subscriber_receives_applied_result() {
    let (addr, stub) = spawn_stub().await;
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    dashboard.store_mut().toggle_item(FilterKind::Product, "Airfryer");
    let first = dashboard.apply();
    assert!(first.is_loading());

    let mut sub = dashboard.subscribe();
    let settled = sub.settled().await.expect("settled");
    assert_eq!(settled.status, QueryStatus::Success);
    assert_eq!(
        settled.data.as_ref().map(|d| d.total_views),
        Some(19_398_123)
    );
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);
}

// ============================================================
// BDD: invalidation refetches the applied key
// ============================================================
#[tokio::test]
async fn invalidate_refetches_applied_filters() {
    let (addr, stub) = spawn_stub().await;
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    dashboard.apply();
    dashboard.refresh().await.expect("first");
    assert!(dashboard.invalidate());
    dashboard.refresh().await.expect("second");
    assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    assert_eq!(stub.queries.lock()[1], Vec::<(String, String)>::new());
}

// ============================================================
// BDD: a rejected query is not refetched by renders, only by Apply
// ============================================================
#[tokio::test]
async fn reapply_retries_a_rejected_query() {
    let (addr, stub) = spawn_stub().await;
    stub.rejections.store(1, Ordering::SeqCst);
    let mut dashboard = Dashboard::from_config(&test_config(addr)).expect("dashboard");

    dashboard.store_mut().toggle_item(FilterKind::Brand, "Koenig");
    dashboard.apply();
    dashboard.refresh().await.expect_err("rejected");

    for _ in 0..5 {
        let snapshot = dashboard.analytics();
        assert_eq!(snapshot.status, QueryStatus::Error);
        assert!(!snapshot.is_fetching);
    }
    assert_eq!(stub.hits.load(Ordering::SeqCst), 1);

    let snapshot = dashboard.apply();
    assert!(snapshot.is_fetching);
    let data = dashboard.refresh().await.expect("second apply");
    assert_eq!(data.total_views, 19_398_123);
    assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
}

//! Dashboard rendering and HTTP routes.
//!
//! The table body is rendered server-side and replaced wholesale on every
//! request. The page embeds a small refresh script that re-fetches the
//! fragment on a fixed interval with a cache-busting query parameter; all
//! selection and filtering logic stays on this side.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::poller::{SpreadSnapshot, SpreadSource};
use crate::spreads::{Price, ScannerStatus, SpreadDocument, SpreadRecord, DEFAULT_TAB};

pub const DASHBOARD_HEADERS: [&str; 6] = [
    "Symbol",
    "Spread",
    "Buy At",
    "Sell At",
    "Networks",
    "Liquidity",
];

/// Interval of the embedded page refresh script.
pub const PAGE_REFRESH_MS: u64 = 10_000;

const COLUMN_COUNT: usize = DASHBOARD_HEADERS.len();
const EMPTY_CATEGORY_MESSAGE: &str = "No profitable pairs in this category yet";
const FETCH_ERROR_MESSAGE: &str = "Data not collected yet. Waiting for the scanner.";

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DashboardQuery {
    pub tab: Option<String>,
}

impl DashboardQuery {
    pub fn tab(&self) -> &str {
        self.tab.as_deref().unwrap_or(DEFAULT_TAB)
    }
}

/// JSON view of one tab: displayable rows only, plus poll metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabSnapshot {
    pub tab: String,
    pub rows: Vec<SpreadRecord>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub scanner: Option<ScannerStatus>,
}

pub fn build_tab_snapshot(snapshot: &SpreadSnapshot, tab: &str) -> TabSnapshot {
    TabSnapshot {
        tab: tab.to_string(),
        rows: snapshot
            .document
            .displayable(tab)
            .into_iter()
            .cloned()
            .collect(),
        fetched_at: snapshot.fetched_at,
        last_error: snapshot.last_error.clone(),
        scanner: snapshot.scanner,
    }
}

pub fn dashboard_router(source: Arc<dyn SpreadSource>) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard_html))
        .route("/dashboard/fragment", get(get_dashboard_fragment))
        .route("/dashboard/snapshot", get(get_dashboard_snapshot))
        .with_state(DashboardAppState { source })
}

/// Table body for `tab`. A failed poll collapses to a single error row so a
/// degraded state is never mistaken for an empty category.
pub fn render_table_body(snapshot: &SpreadSnapshot, tab: &str) -> String {
    if snapshot.last_error.is_some() {
        return message_row("row-error", FETCH_ERROR_MESSAGE);
    }

    let records = snapshot.document.displayable(tab);
    if records.is_empty() {
        return message_row("row-empty", EMPTY_CATEGORY_MESSAGE);
    }

    let mut out = String::new();
    for record in records {
        out.push_str("<tr>");
        out.push_str(&format!("<td><b>{}</b></td>", escape_html(&record.symbol)));
        out.push_str(&format!("<td class=\"spread\">{}%</td>", record.spread));
        out.push_str(&format!("<td>{}</td>", escape_html(&record.buy_display())));
        out.push_str(&format!("<td>{}</td>", escape_html(&record.sell_display())));
        out.push_str(&format!(
            "<td><small>{}</small></td>",
            escape_html(record.networks_display())
        ));
        out.push_str(&format!(
            "<td>{}</td>",
            escape_html(record.liquidity_display())
        ));
        out.push_str("</tr>\n");
    }
    out
}

pub fn render_dashboard_html(snapshot: &SpreadSnapshot, tab: &str) -> String {
    let last_update = snapshot
        .fetched_at
        .map(|fetched| fetched.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    let (toggle_label, toggle_class, status_text) = scanner_presentation(snapshot.scanner);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>Spreadwatch</title>\n");
    out.push_str("<style>:root{--bg:#10151c;--card:#1a212b;--ink:#e8edf2;--muted:#8b97a3;--line:#2a3440;--head:#0c1117;--accent:#00c853;--btn:#1f6feb;--stop:#d64545}*{box-sizing:border-box}body{margin:0;color:var(--ink);font-family:\"Segoe UI\",\"Helvetica Neue\",sans-serif;background:var(--bg);min-height:100vh}.shell{max-width:1100px;margin:0 auto;padding:24px 16px}.hero{display:flex;justify-content:space-between;align-items:center;flex-wrap:wrap;gap:12px}.hero h1{margin:0;font-size:1.5rem}.hero-meta{color:var(--muted);font-size:.9rem}.tabs{margin:16px 0 0}.tab-btn{display:inline-block;padding:8px 16px;margin-right:6px;border-radius:8px 8px 0 0;background:var(--card);color:var(--muted);text-decoration:none;text-transform:uppercase;font-size:.82rem;letter-spacing:.05em}.tab-btn.active{background:var(--head);color:var(--ink);font-weight:700}.card{background:var(--card);border:1px solid var(--line);border-radius:0 10px 10px 10px;overflow:auto}table{width:100%;border-collapse:collapse;min-width:720px}thead th{background:var(--head);color:var(--muted);text-transform:uppercase;font-size:.76rem;letter-spacing:.05em;padding:10px;text-align:left}tbody td{padding:9px 10px;border-top:1px solid var(--line);font-size:.88rem;white-space:nowrap}td.spread{color:var(--accent);font-weight:700}.row-message{text-align:center;color:var(--muted)}.row-error{color:var(--stop)}.scanner{display:flex;align-items:center;gap:10px}.scanner-btn{background:var(--btn);color:#fff;border:0;border-radius:8px;padding:8px 14px;font-size:.85rem;cursor:pointer}.scanner-btn.stop{background:var(--stop)}#scanner-state{color:var(--muted);font-size:.88rem}</style>\n");
    out.push_str("</head><body data-tab=\"");
    out.push_str(&escape_html(tab));
    out.push_str("\"><main class=\"shell\">\n");

    out.push_str("<section class=\"hero\"><h1>Spreadwatch</h1>");
    out.push_str("<div class=\"scanner\">");
    out.push_str(&format!(
        "<button id=\"scanner-toggle\" class=\"{toggle_class}\" onclick=\"toggleScanner()\">{toggle_label}</button>"
    ));
    out.push_str(&format!("<span id=\"scanner-state\">{status_text}</span>"));
    out.push_str("</div>");
    out.push_str(&format!(
        "<div class=\"hero-meta\">Last update: <span id=\"last-update\">{}</span></div>",
        escape_html(&last_update)
    ));
    out.push_str("</section>\n");

    out.push_str("<nav class=\"tabs\">");
    out.push_str(&render_tab_buttons(&snapshot.document, tab));
    out.push_str("</nav>\n");

    out.push_str("<section class=\"card\"><table>\n<thead><tr>");
    for header in DASHBOARD_HEADERS {
        out.push_str("<th>");
        out.push_str(&escape_html(header));
        out.push_str("</th>");
    }
    out.push_str("</tr></thead><tbody id=\"table-body\">\n");
    out.push_str(&render_table_body(snapshot, tab));
    out.push_str("</tbody></table></section>\n");

    // The toggle is deliberately a stub: scanner control lives with the
    // scanner's own credentials, never with this page.
    out.push_str("<script>\n");
    out.push_str("function toggleScanner(){alert('Scanner control requires credentials this dashboard does not hold. Start or stop the scanner where it runs.');}\n");
    out.push_str("async function refresh(){\n");
    out.push_str("try{\n");
    out.push_str("const tab=encodeURIComponent(document.body.dataset.tab);\n");
    out.push_str("const response=await fetch('/dashboard/fragment?tab='+tab+'&t='+Date.now());\n");
    out.push_str("if(!response.ok)return;\n");
    out.push_str("document.getElementById('table-body').innerHTML=await response.text();\n");
    out.push_str(
        "document.getElementById('last-update').innerText=new Date().toLocaleTimeString();\n",
    );
    out.push_str("}catch(e){}\n");
    out.push_str("}\n");
    out.push_str(&format!("setInterval(refresh, {PAGE_REFRESH_MS});\n"));
    out.push_str("</script>\n");

    out.push_str("</main></body></html>\n");
    out
}

/// One button per category present in the document; the selected tab is
/// always rendered, and exactly one button carries the active class.
fn render_tab_buttons(document: &SpreadDocument, selected: &str) -> String {
    let mut names: Vec<&str> = document.category_names().collect();
    if !names.iter().any(|name| *name == selected) {
        names.push(selected);
    }

    let mut out = String::new();
    for name in names {
        let class = if name == selected {
            "tab-btn active"
        } else {
            "tab-btn"
        };
        out.push_str(&format!(
            "<a class=\"{class}\" href=\"/dashboard?tab={name}\">{label}</a>",
            name = escape_html(name),
            label = escape_html(name)
        ));
    }
    out
}

fn scanner_presentation(
    scanner: Option<ScannerStatus>,
) -> (&'static str, &'static str, &'static str) {
    match scanner {
        Some(ScannerStatus { active: true }) => ("Stop scanner", "scanner-btn stop", "Running"),
        Some(ScannerStatus { active: false }) => ("Start scanner", "scanner-btn", "stopped"),
        None => ("Start scanner", "scanner-btn", "unknown"),
    }
}

fn message_row(class: &str, message: &str) -> String {
    format!(
        "<tr><td colspan=\"{COLUMN_COUNT}\" class=\"row-message {class}\">{}</td></tr>\n",
        escape_html(message)
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Fixed snapshot for running the dashboard without a scanner behind it.
pub fn demo_snapshot() -> SpreadSnapshot {
    let mut document = SpreadDocument::default();
    document.categories.insert(
        "dex".to_string(),
        vec![
            SpreadRecord {
                symbol: "ETH".to_string(),
                spread: 1.5,
                buy_at: "OKX".to_string(),
                sell_at: "Binance".to_string(),
                buy_price: None,
                sell_price: None,
                networks: None,
                liquidity: None,
            },
            SpreadRecord {
                symbol: "SOL".to_string(),
                spread: 0.8,
                buy_at: "Bybit".to_string(),
                sell_at: "OKX".to_string(),
                buy_price: Some(Price::Number(151.2)),
                sell_price: Some(Price::Number(152.4)),
                networks: Some("SOL".to_string()),
                liquidity: Some("$1.2M".to_string()),
            },
        ],
    );
    document.categories.insert(
        "spot".to_string(),
        vec![
            SpreadRecord {
                symbol: "BTC".to_string(),
                spread: 0.4,
                buy_at: "Binance".to_string(),
                sell_at: "Bybit".to_string(),
                buy_price: None,
                sell_price: None,
                networks: Some("BTC".to_string()),
                liquidity: Some("$4.8M".to_string()),
            },
            // Sentinel value from the scanner; filtered out of the display.
            SpreadRecord {
                symbol: "DUST".to_string(),
                spread: 72.0,
                buy_at: "Bybit".to_string(),
                sell_at: "Binance".to_string(),
                buy_price: None,
                sell_price: None,
                networks: None,
                liquidity: None,
            },
        ],
    );

    SpreadSnapshot {
        document,
        fetched_at: Some(Utc::now()),
        last_error: None,
        scanner: Some(ScannerStatus { active: true }),
    }
}

#[derive(Clone)]
struct DashboardAppState {
    source: Arc<dyn SpreadSource>,
}

async fn get_dashboard_html(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    // A page open or tab switch wants fresh data ahead of the next tick.
    state.source.request_refresh();
    let snapshot = state.source.snapshot();
    Html(render_dashboard_html(&snapshot, query.tab()))
}

async fn get_dashboard_fragment(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    let snapshot = state.source.snapshot();
    Html(render_table_body(&snapshot, query.tab()))
}

async fn get_dashboard_snapshot(
    State(state): State<DashboardAppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    info!(
        component = "dashboard",
        event = "http.snapshot.request",
        tab = query.tab()
    );
    let snapshot = state.source.snapshot();
    Json(build_tab_snapshot(&snapshot, query.tab()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(symbol: &str, spread: f64) -> SpreadRecord {
        SpreadRecord {
            symbol: symbol.to_string(),
            spread,
            buy_at: "OKX".to_string(),
            sell_at: "Binance".to_string(),
            buy_price: None,
            sell_price: None,
            networks: None,
            liquidity: None,
        }
    }

    fn snapshot_with(records: Vec<SpreadRecord>) -> SpreadSnapshot {
        let mut document = SpreadDocument::default();
        document.categories.insert("dex".to_string(), records);
        SpreadSnapshot {
            document,
            fetched_at: Some(Utc::now()),
            last_error: None,
            scanner: None,
        }
    }

    #[test]
    fn header_order_and_column_count_are_exact() {
        assert_eq!(DASHBOARD_HEADERS.len(), 6);
        assert_eq!(DASHBOARD_HEADERS[0], "Symbol");
        assert_eq!(DASHBOARD_HEADERS[5], "Liquidity");
    }

    #[test]
    fn renders_one_row_per_displayable_record_in_input_order() {
        let snapshot = snapshot_with(vec![record("ETH", 1.5), record("SOL", 0.8)]);
        let body = render_table_body(&snapshot, "dex");

        assert_eq!(body.matches("<tr>").count(), 2);
        let eth = body.find("ETH").expect("ETH row expected");
        let sol = body.find("SOL").expect("SOL row expected");
        assert!(eth < sol);
    }

    #[test]
    fn end_to_end_row_cells_match_expected_display() {
        let snapshot = snapshot_with(vec![record("ETH", 1.5)]);
        let body = render_table_body(&snapshot, "dex");

        assert!(body.contains("<td><b>ETH</b></td>"));
        assert!(body.contains("<td class=\"spread\">1.5%</td>"));
        assert!(body.contains("<td>OKX</td>"));
        assert!(body.contains("<td>Binance</td>"));
        assert!(body.contains("<td><small>Auto</small></td>"));
        assert!(body.contains("<td>-</td>"));
    }

    #[test]
    fn boundary_spreads_are_filtered_inclusively_at_fifty() {
        let snapshot = snapshot_with(vec![
            record("ZERO", 0.0),
            record("EDGE", 50.0),
            record("OVER", 50.01),
        ]);
        let body = render_table_body(&snapshot, "dex");

        assert_eq!(body.matches("<tr>").count(), 1);
        assert!(body.contains("EDGE"));
        assert!(!body.contains("ZERO"));
        assert!(!body.contains("OVER"));
    }

    #[test]
    fn empty_category_renders_single_placeholder_row_spanning_all_columns() {
        let snapshot = snapshot_with(vec![]);
        let body = render_table_body(&snapshot, "dex");

        assert_eq!(body.matches("<tr>").count(), 1);
        assert!(body.contains("colspan=\"6\""));
        assert!(body.contains(EMPTY_CATEGORY_MESSAGE));
    }

    #[test]
    fn unknown_tab_renders_placeholder_not_another_category() {
        let snapshot = snapshot_with(vec![record("ETH", 1.5)]);
        let body = render_table_body(&snapshot, "futures");

        assert!(body.contains(EMPTY_CATEGORY_MESSAGE));
        assert!(!body.contains("ETH"));
    }

    #[test]
    fn fetch_failure_renders_single_error_row() {
        let mut snapshot = snapshot_with(vec![record("ETH", 1.5)]);
        snapshot.last_error = Some("transport error: connection refused".to_string());
        let body = render_table_body(&snapshot, "dex");

        assert_eq!(body.matches("<tr>").count(), 1);
        assert!(body.contains("row-error"));
        assert!(body.contains(FETCH_ERROR_MESSAGE));
        assert!(!body.contains("ETH"));
    }

    #[test]
    fn rendering_is_idempotent_for_an_unchanged_snapshot() {
        let snapshot = snapshot_with(vec![record("ETH", 1.5), record("SOL", 0.8)]);
        assert_eq!(
            render_dashboard_html(&snapshot, "dex"),
            render_dashboard_html(&snapshot, "dex")
        );
    }

    #[test]
    fn exactly_one_tab_button_is_active() {
        let mut snapshot = snapshot_with(vec![record("ETH", 1.5)]);
        snapshot
            .document
            .categories
            .insert("spot".to_string(), vec![]);

        let dex = render_dashboard_html(&snapshot, "dex");
        assert_eq!(dex.matches("tab-btn active").count(), 1);
        assert!(dex.contains("class=\"tab-btn active\" href=\"/dashboard?tab=dex\""));

        let spot = render_dashboard_html(&snapshot, "spot");
        assert_eq!(spot.matches("tab-btn active").count(), 1);
        assert!(spot.contains("class=\"tab-btn active\" href=\"/dashboard?tab=spot\""));
    }

    #[test]
    fn selected_tab_button_exists_even_when_document_lacks_it() {
        let snapshot = SpreadSnapshot::default();
        let html = render_dashboard_html(&snapshot, "dex");
        assert!(html.contains("class=\"tab-btn active\" href=\"/dashboard?tab=dex\""));
    }

    #[test]
    fn scanner_states_map_to_button_label_and_status_text() {
        let mut snapshot = snapshot_with(vec![]);

        snapshot.scanner = Some(ScannerStatus { active: true });
        let html = render_dashboard_html(&snapshot, "dex");
        assert!(html.contains(">Stop scanner</button>"));
        assert!(html.contains("scanner-btn stop"));
        assert!(html.contains("<span id=\"scanner-state\">Running</span>"));

        snapshot.scanner = Some(ScannerStatus { active: false });
        let html = render_dashboard_html(&snapshot, "dex");
        assert!(html.contains(">Start scanner</button>"));
        assert!(html.contains("<span id=\"scanner-state\">stopped</span>"));
    }

    #[test]
    fn page_embeds_refresh_script_and_stub_toggle() {
        let snapshot = snapshot_with(vec![]);
        let html = render_dashboard_html(&snapshot, "dex");

        assert!(html.contains(&format!("setInterval(refresh, {PAGE_REFRESH_MS})")));
        assert!(html.contains("/dashboard/fragment?tab="));
        assert!(html.contains("'&t='+Date.now()"));
        assert!(html.contains("toggleScanner"));
        assert!(html.contains("alert("));
    }

    #[test]
    fn interpolated_values_are_html_escaped() {
        let snapshot = snapshot_with(vec![SpreadRecord {
            symbol: "<script>".to_string(),
            spread: 1.0,
            buy_at: "A&B".to_string(),
            sell_at: "C".to_string(),
            buy_price: None,
            sell_price: None,
            networks: None,
            liquidity: None,
        }]);

        let body = render_table_body(&snapshot, "dex");
        assert!(body.contains("&lt;script&gt;"));
        assert!(body.contains("A&amp;B"));
        assert!(!body.contains("<script>"));
    }

    #[test]
    fn tab_snapshot_contains_only_displayable_rows() {
        let snapshot = snapshot_with(vec![record("ETH", 1.5), record("JUNK", 99.0)]);
        let tab = build_tab_snapshot(&snapshot, "dex");

        assert_eq!(tab.tab, "dex");
        assert_eq!(tab.rows.len(), 1);
        assert_eq!(tab.rows[0].symbol, "ETH");
    }

    #[test]
    fn demo_snapshot_covers_both_tabs_and_hides_sentinel_rows() {
        let snapshot = demo_snapshot();
        assert_eq!(snapshot.document.displayable("dex").len(), 2);
        assert_eq!(snapshot.document.displayable("spot").len(), 1);
        assert_eq!(snapshot.scanner, Some(ScannerStatus { active: true }));
    }
}

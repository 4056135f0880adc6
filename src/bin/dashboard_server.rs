use std::{net::SocketAddr, sync::Arc};

use spreadwatch::{
    dashboard_router, demo_snapshot, init_logging, log_app_bind, log_app_start,
    log_source_selected, logging_config_from_env, InMemorySpreadSource, PollerConfig,
    PollingSpreadSource, SpreadSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start(&logging_cfg);

    let addr: SocketAddr = std::env::var("SPREADWATCH_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()?;

    let source: Arc<dyn SpreadSource> = source_from_env();
    let app = dashboard_router(source);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn source_from_env() -> Arc<dyn SpreadSource> {
    let force_demo = std::env::var("SPREADWATCH_USE_DEMO")
        .map(|raw| raw == "1" || raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    if force_demo {
        log_source_selected("demo", Some("SPREADWATCH_USE_DEMO"));
        return Arc::new(InMemorySpreadSource::new(demo_snapshot()));
    }

    let Ok(spreads_url) = std::env::var("SPREADWATCH_SPREADS_URL") else {
        log_source_selected("demo", Some("SPREADWATCH_SPREADS_URL unset"));
        return Arc::new(InMemorySpreadSource::new(demo_snapshot()));
    };

    let mut cfg = PollerConfig {
        spreads_url,
        status_url: std::env::var("SPREADWATCH_STATUS_URL").ok(),
        ..PollerConfig::default()
    };
    if let Some(refresh_ms) = std::env::var("SPREADWATCH_REFRESH_MS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
    {
        cfg.refresh_interval_ms = refresh_ms;
    }

    log_source_selected("polling", Some(cfg.spreads_url.as_str()));
    Arc::new(PollingSpreadSource::spawn(cfg))
}

use std::{error::Error, sync::Arc};

use jeju_backend::{
    AppState,
    config::Config,
    create_router,
    loader::{NetworkHandle, NetworkSource, RetryPolicy},
    schedule::{DEFAULT_TIMEOUT, ScheduleClient},
    supabase::SupabaseClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jeju_backend=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let network = NetworkHandle::new();
    let source = NetworkSource::from_locations(&config.node_geojson, &config.link_geojson);
    tracing::info!("loading road network from {source:?}");
    network.spawn_load(source, RetryPolicy::default());

    let places = match &config.supabase {
        Some(supabase) => Some(Arc::new(SupabaseClient::new(&supabase.url, &supabase.anon_key))),
        None => {
            tracing::warn!("SUPABASE_URL not set, place endpoints disabled");
            None
        }
    };
    let scheduler = match &config.schedule_api {
        Some(url) => Some(Arc::new(ScheduleClient::new(url, DEFAULT_TIMEOUT)?)),
        None => {
            tracing::warn!("SCHEDULE_API not set, itineraries are built locally");
            None
        }
    };

    let state = AppState {
        places,
        scheduler,
        max_radius_m: config.node_max_radius_m,
        ..AppState::new(network)
    };
    let app = create_router(state);

    tracing::info!("starting backend on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

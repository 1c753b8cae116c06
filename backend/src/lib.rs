pub mod config;
pub mod error;
pub mod geojson;
pub mod gpx_export;
pub mod itinerary;
pub mod loader;
pub mod models;
pub mod network;
pub mod normalize;
pub mod places;
pub mod prompt;
pub mod route_parser;
pub mod routing;
pub mod schedule;
pub mod supabase;

use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};

use crate::error::AppError;
use crate::gpx_export::encode_day_as_gpx;
use crate::itinerary::{
    MAX_PLACES_PER_DAY, MAX_TRIP_DAYS, attach_routes, build_local_itinerary, fill_candidates,
    total_distance_km,
};
use crate::loader::{DEFAULT_READY_TIMEOUT, LoadState, NetworkHandle};
use crate::models::{
    Category, GpxRequest, GpxResponse, HealthResponse, NearestNodeRequest, NearestNodeResponse,
    NodePathRequest, NodePathResponse, ParseRouteRequest, ParseRouteResponse, Place, PlacesQuery,
    PromptRequest, ScheduleRequest, ScheduleResponse, ScheduleSource,
};
use crate::network::{DEFAULT_MAX_RADIUS_M, RoadNetwork};
use crate::places::{Keyword, PlaceFilter, filter_places, rank_places};
use crate::prompt::{ParsedPrompt, parse_prompt};
use crate::route_parser::{parse_interleaved_route, parse_route_tokens};
use crate::routing::approximate_distance_km;
use crate::schedule::{GenerateScheduleRequest, ScheduleClient, to_itinerary};
use crate::supabase::SupabaseClient;

#[derive(Clone)]
pub struct AppState {
    pub network: NetworkHandle,
    pub places: Option<Arc<SupabaseClient>>,
    pub scheduler: Option<Arc<ScheduleClient>>,
    pub max_radius_m: f64,
    /// How long a request waits for a network that is still loading.
    pub ready_timeout: Duration,
}

impl AppState {
    pub fn new(network: NetworkHandle) -> Self {
        Self {
            network,
            places: None,
            scheduler: None,
            max_radius_m: DEFAULT_MAX_RADIUS_M,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    async fn ready_network(&self) -> Result<Arc<RoadNetwork>, AppError> {
        Ok(self.network.wait_ready(self.ready_timeout).await?)
    }

    fn places_client(&self) -> Result<&SupabaseClient, AppError> {
        self.places.as_deref().ok_or(AppError::Disabled("place data"))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/route/parse", post(parse_route_handler))
        .route("/api/nodes/nearest", post(nearest_nodes_handler))
        .route("/api/path", post(node_path_handler))
        .route("/api/prompt", post(prompt_handler))
        .route("/api/places/:category", get(places_handler))
        .route("/api/places/:category/:id/reviews", get(reviews_handler))
        .route("/api/schedule", post(schedule_handler))
        .route("/api/itinerary/gpx", post(gpx_handler))
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let load_state = state.network.current();
    let stats = match &load_state {
        LoadState::Ready(network) => Some(network.stats()),
        _ => None,
    };
    Json(HealthResponse {
        network: load_state.label().to_string(),
        node_count: stats.as_ref().map(|s| s.node_count),
        link_count: stats.as_ref().map(|s| s.link_count),
        places_enabled: state.places.is_some(),
        scheduler_enabled: state.scheduler.is_some(),
    })
}

async fn parse_route_handler(
    State(state): State<AppState>,
    Json(req): Json<ParseRouteRequest>,
) -> Result<Json<ParseRouteResponse>, AppError> {
    let route = parse_route_tokens(&req.interleaved_route)?;

    // Geometry is a bonus; the segments alone are useful before the network is up.
    let (path, distance_km) = match state.network.network() {
        Some(network) if !route.is_empty() => (
            Some(network.route_geometry(&route)),
            Some(network.route_distance_km(&route)),
        ),
        _ => (None, None),
    };

    Ok(Json(ParseRouteResponse {
        route,
        path,
        distance_km,
    }))
}

async fn nearest_nodes_handler(
    State(state): State<AppState>,
    Json(req): Json<NearestNodeRequest>,
) -> Result<Json<NearestNodeResponse>, AppError> {
    let max_radius_m = req.max_radius_m.unwrap_or(state.max_radius_m);
    if !(max_radius_m.is_finite() && max_radius_m > 0.0) {
        return Err(AppError::BadRequest(format!("invalid maxRadiusM {max_radius_m}")));
    }

    let network = state.ready_network().await?;
    let mut places = req.places;
    let stats = network.map_places_to_nodes(&mut places, max_radius_m);
    tracing::debug!(
        "mapped {} places, {} unmatched, {} without coordinates",
        stats.mapped,
        stats.unmatched,
        stats.skipped
    );

    Ok(Json(NearestNodeResponse {
        places,
        mapped: stats.mapped,
        unmatched: stats.unmatched,
        skipped: stats.skipped,
    }))
}

async fn node_path_handler(
    State(state): State<AppState>,
    Json(req): Json<NodePathRequest>,
) -> Result<Json<NodePathResponse>, AppError> {
    let network = state.ready_network().await?;
    let found = network.find_node_path(req.start, req.end);

    let (links, path, distance_km) = if found.fallback {
        let path: Vec<_> = found
            .nodes
            .iter()
            .filter_map(|id| network.node(*id).map(|n| n.coord))
            .collect();
        let distance_km = approximate_distance_km(&path);
        (Vec::new(), path, distance_km)
    } else {
        let route = network.path_to_route(&found.nodes);
        (
            route.link_ids.clone(),
            network.route_geometry(&route),
            network.route_distance_km(&route),
        )
    };

    Ok(Json(NodePathResponse {
        nodes: found.nodes,
        links,
        path,
        distance_km,
        fallback: found.fallback,
    }))
}

async fn prompt_handler(Json(req): Json<PromptRequest>) -> Result<Json<ParsedPrompt>, AppError> {
    Ok(Json(parse_prompt(&req.prompt)?))
}

fn parse_category(raw: &str) -> Result<Category, AppError> {
    raw.parse::<Category>()
        .map_err(|err| AppError::NotFound(err.to_string()))
}

async fn places_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<PlacesQuery>,
) -> Result<Json<Vec<Place>>, AppError> {
    let category = parse_category(&category)?;
    let client = state.places_client()?;

    let places = client.fetch_places(category).await?;
    let filter = PlaceFilter {
        query: query.q,
        min_rating: query.min_rating,
        categories: vec![category],
    };
    let mut places = filter_places(places, &filter);

    let keywords: Vec<Keyword> = query
        .keywords
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Keyword::unranked)
        .collect();
    rank_places(&mut places, &keywords);
    if let Some(limit) = query.limit {
        places.truncate(limit);
    }

    if let Some(network) = state.network.network() {
        network.map_places_to_nodes(&mut places, state.max_radius_m);
    }
    Ok(Json(places))
}

async fn reviews_handler(
    State(state): State<AppState>,
    Path((category, id)): Path<(String, i64)>,
) -> Result<Json<Vec<Value>>, AppError> {
    let category = parse_category(&category)?;
    let reviews = state.places_client()?.fetch_reviews(category, id).await?;
    Ok(Json(reviews))
}

async fn schedule_handler(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, AppError> {
    if req.end_datetime < req.start_datetime {
        return Err(AppError::BadRequest("trip ends before it starts".into()));
    }
    if req.selected_places.is_empty() && req.candidate_places.is_empty() {
        return Err(AppError::BadRequest("no places to schedule".into()));
    }

    if req.places_per_day > MAX_PLACES_PER_DAY {
        return Err(AppError::BadRequest(format!(
            "placesPerDay {} exceeds {MAX_PLACES_PER_DAY}",
            req.places_per_day
        )));
    }

    let span = (req.end_datetime.date() - req.start_datetime.date()).num_days() + 1;
    if span > i64::from(MAX_TRIP_DAYS) {
        return Err(AppError::BadRequest(format!(
            "trip spans {span} days, at most {MAX_TRIP_DAYS} are supported"
        )));
    }
    let days = span as u32;
    let mut candidates = req.candidate_places;
    if req.places_per_day > 0 {
        let filled = fill_candidates(&req.selected_places, &candidates, days, req.places_per_day);
        let filled_keys: HashSet<(Category, i64)> = filled.iter().map(|p| (p.category, p.id)).collect();
        candidates.retain(|p| !filled_keys.contains(&(p.category, p.id)));
        candidates.splice(0..0, filled);
    }

    let network = state.network.network();
    let mut known: Vec<Place> = req
        .selected_places
        .iter()
        .chain(candidates.iter())
        .cloned()
        .collect();
    if let Some(network) = &network {
        network.map_places_to_nodes(&mut known, state.max_radius_m);
    }

    let remote = match &state.scheduler {
        Some(scheduler) => {
            let request = GenerateScheduleRequest::new(
                &req.selected_places,
                &candidates,
                req.start_datetime,
                req.end_datetime,
            );
            match scheduler.generate(&request).await {
                Ok(response) => Some(to_itinerary(&response, &known, req.start_datetime)),
                Err(err) => {
                    tracing::warn!("schedule service unavailable, using local itinerary: {err}");
                    None
                }
            }
        }
        None => None,
    };

    let (source, mut days) = match remote {
        Some(days) if days.iter().any(|d| !d.places.is_empty()) => (ScheduleSource::Remote, days),
        _ => {
            let stops = local_stops(&known, req.selected_places.len());
            (
                ScheduleSource::Local,
                build_local_itinerary(&stops, req.start_datetime, req.end_datetime),
            )
        }
    };

    let routed = attach_routes(&mut days, network.as_deref());
    tracing::info!("{source:?} itinerary: {} days, {routed} routed", days.len());

    Ok(Json(ScheduleResponse {
        source,
        total_distance_km: total_distance_km(&days),
        days,
    }))
}

/// Selected places plus auto-filled candidates, each once. With nothing selected
/// or filled, every known place is visited.
fn local_stops(known: &[Place], selected: usize) -> Vec<Place> {
    let mut seen = HashSet::new();
    let mut stops: Vec<Place> = known
        .iter()
        .enumerate()
        .filter(|(idx, place)| *idx < selected || place.is_candidate)
        .map(|(_, place)| place.clone())
        .collect();
    if stops.is_empty() {
        stops = known.to_vec();
    }
    stops.retain(|place| seen.insert((place.category, place.id)));
    stops
}

async fn gpx_handler(
    State(state): State<AppState>,
    Json(req): Json<GpxRequest>,
) -> Result<Json<GpxResponse>, AppError> {
    let geometry = match (state.network.network(), parse_interleaved_route(&req.day.interleaved_route)) {
        (Some(network), Ok(route)) => network.route_geometry(&route),
        (_, Err(err)) => return Err(err.into()),
        (None, Ok(_)) => Vec::new(),
    };
    let gpx_base64 = encode_day_as_gpx(&req.day, &geometry)?;
    Ok(Json(GpxResponse { gpx_base64 }))
}

use serde::{Deserialize, Serialize};

pub use shared::{
    ApiError, Category, Coordinate, ItineraryDay, ItineraryPlace, LinkId, NodeId, ParsedRoute,
    Place, RouteSegment,
};

use crate::route_parser::RouteToken;

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseRouteRequest {
    pub interleaved_route: Vec<RouteToken>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRouteResponse {
    #[serde(flatten)]
    pub route: ParsedRoute,
    /// Present once the road network is loaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Coordinate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestNodeRequest {
    pub places: Vec<Place>,
    #[serde(default)]
    pub max_radius_m: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestNodeResponse {
    pub places: Vec<Place>,
    pub mapped: usize,
    pub unmatched: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodePathRequest {
    pub start: NodeId,
    pub end: NodeId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePathResponse {
    pub nodes: Vec<NodeId>,
    pub links: Vec<LinkId>,
    pub path: Vec<Coordinate>,
    pub distance_km: f64,
    /// True when BFS found no connection and the direct pair was returned.
    pub fallback: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacesQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub min_rating: Option<f64>,
    /// Comma separated keywords used for weighting.
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub selected_places: Vec<Place>,
    #[serde(default)]
    pub candidate_places: Vec<Place>,
    pub start_datetime: chrono::NaiveDateTime,
    pub end_datetime: chrono::NaiveDateTime,
    /// Auto-fill target per category and day; 0 disables candidate filling.
    #[serde(default)]
    pub places_per_day: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleSource {
    Remote,
    Local,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub source: ScheduleSource,
    pub days: Vec<ItineraryDay>,
    pub total_distance_km: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GpxRequest {
    pub day: ItineraryDay,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GpxResponse {
    pub gpx_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_count: Option<usize>,
    pub places_enabled: bool,
    pub scheduler_enabled: bool,
}

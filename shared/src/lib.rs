use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identifier of a road-network intersection (GeoJSON node feature).
pub type NodeId = u64;
/// Identifier of a road-network segment (GeoJSON link feature).
pub type LinkId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Rows with missing coordinates come back as `0,0`, which is never on Jeju.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
            && !(self.lat == 0.0 && self.lon == 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Accommodation,
    Restaurant,
    Cafe,
    #[serde(alias = "landmark")]
    Attraction,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Accommodation,
        Category::Restaurant,
        Category::Cafe,
        Category::Attraction,
    ];

    /// Prefix of the backing tables, e.g. `landmark_information`.
    pub fn table_prefix(self) -> &'static str {
        match self {
            Category::Accommodation => "accommodation",
            Category::Restaurant => "restaurant",
            Category::Cafe => "cafe",
            Category::Attraction => "landmark",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Accommodation => "accommodation",
            Category::Restaurant => "restaurant",
            Category::Cafe => "cafe",
            Category::Attraction => "attraction",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown place category `{}`", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accommodation" | "accomodation" | "lodging" | "숙소" => Ok(Category::Accommodation),
            "restaurant" | "food" | "음식점" | "맛집" => Ok(Category::Restaurant),
            "cafe" | "café" | "카페" => Ok(Category::Cafe),
            "attraction" | "landmark" | "tourist" | "관광지" => Ok(Category::Attraction),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_address: Option<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_detail: Option<String>,
    /// Longitude.
    #[serde(default)]
    pub x: Option<f64>,
    /// Latitude.
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naver_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_node_id: Option<NodeId>,
    /// Metres to `geo_node_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_node_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default)]
    pub is_candidate: bool,
}

impl Place {
    pub fn new(id: i64, name: impl Into<String>, category: Category) -> Self {
        Self {
            id,
            name: name.into(),
            address: String::new(),
            road_address: None,
            category,
            category_detail: None,
            x: None,
            y: None,
            rating: 0.0,
            review_count: 0,
            naver_link: None,
            instagram_link: None,
            homepage: None,
            geo_node_id: None,
            geo_node_distance: None,
            weight: None,
            is_candidate: false,
        }
    }

    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.x = Some(lon);
        self.y = Some(lat);
        self
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        let coord = Coordinate {
            lat: self.y?,
            lon: self.x?,
        };
        coord.is_valid().then_some(coord)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryPlace {
    #[serde(flatten)]
    pub place: Place,
    /// `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrive_time: Option<String>,
    /// `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depart_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stay_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub from: NodeId,
    pub to: NodeId,
    pub links: Vec<LinkId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRoute {
    pub segments: Vec<RouteSegment>,
    pub node_ids: Vec<NodeId>,
    pub link_ids: Vec<LinkId>,
}

impl ParsedRoute {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub day: u32,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub places: Vec<ItineraryPlace>,
    pub total_distance_km: f64,
    #[serde(rename = "interleaved_route", alias = "interleavedRoute", default)]
    pub interleaved_route: Vec<u64>,
    #[serde(default)]
    pub segments: Vec<RouteSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

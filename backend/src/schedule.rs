//! Client for the external schedule generator (`POST {base}/generate_schedule`).

use std::{collections::HashMap, time::Duration};

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    itinerary::MAX_TRIP_DAYS,
    models::{ItineraryDay, ItineraryPlace, ParsedRoute, Place},
    route_parser::{RouteToken, parse_route_tokens},
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("schedule service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("schedule service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected schedule payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ScheduleError {
    fn is_retryable(&self) -> bool {
        match self {
            ScheduleError::Http(err) => err.is_connect() || err.is_timeout(),
            ScheduleError::Status { status, .. } => *status >= 500,
            ScheduleError::Decode(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceStub {
    pub id: i64,
    pub name: String,
}

impl From<&Place> for PlaceStub {
    fn from(place: &Place) -> Self {
        Self {
            id: place.id,
            name: place.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateScheduleRequest {
    pub selected_places: Vec<PlaceStub>,
    pub candidate_places: Vec<PlaceStub>,
    /// ISO 8601
    pub start_datetime: String,
    /// ISO 8601
    pub end_datetime: String,
}

impl GenerateScheduleRequest {
    pub fn new(
        selected: &[Place],
        candidates: &[Place],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        const ISO: &str = "%Y-%m-%dT%H:%M:%S";
        Self {
            selected_places: selected.iter().map(PlaceStub::from).collect(),
            candidate_places: candidates.iter().map(PlaceStub::from).collect(),
            start_datetime: start.format(ISO).to_string(),
            end_datetime: end.format(ISO).to_string(),
        }
    }
}

/// Day reference as sent by the service: a day number or a label such as `"Mon"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayRef {
    Number(u32),
    Label(String),
}

impl DayRef {
    /// Explicit day number, counted from 1. Day `0` is read as day 1.
    fn number(&self) -> Option<u32> {
        match self {
            DayRef::Number(n) => Some((*n).max(1)),
            DayRef::Label(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(default, alias = "place_id")]
    pub id: Option<i64>,
    #[serde(default, alias = "name")]
    pub place_name: Option<String>,
    #[serde(default)]
    pub place_type: Option<String>,
    #[serde(default)]
    pub day: Option<DayRef>,
    #[serde(default, alias = "arrival_time", alias = "start_time")]
    pub arrive_time: Option<String>,
    #[serde(default, alias = "departure_time", alias = "end_time")]
    pub depart_time: Option<String>,
    #[serde(default)]
    pub time_block: Option<String>,
}

impl ScheduleEntry {
    /// Entries without a day belong to day 1.
    fn day_ref(&self) -> DayRef {
        self.day.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteSummary {
    pub day: DayRef,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_distance_m: f64,
    #[serde(default)]
    pub interleaved_route: Vec<RouteToken>,
    #[serde(default)]
    pub places_routed: Vec<String>,
}

impl Default for DayRef {
    fn default() -> Self {
        DayRef::Number(1)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateScheduleResponse {
    #[serde(default)]
    pub schedule: Vec<ScheduleEntry>,
    #[serde(default)]
    pub route_summary: Vec<RouteSummary>,
}

#[derive(Clone)]
pub struct ScheduleClient {
    http: reqwest::Client,
    base_url: String,
    attempts: u32,
    backoff: Duration,
}

impl ScheduleClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScheduleError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            attempts: 2,
            backoff: Duration::from_secs(1),
        })
    }

    pub fn with_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/generate_schedule", self.base_url)
    }

    pub async fn generate(
        &self,
        request: &GenerateScheduleRequest,
    ) -> Result<GenerateScheduleResponse, ScheduleError> {
        let mut attempt = 1;
        loop {
            match self.try_generate(request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    tracing::warn!("schedule request attempt {attempt} failed: {err}, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_generate(
        &self,
        request: &GenerateScheduleRequest,
    ) -> Result<GenerateScheduleResponse, ScheduleError> {
        tracing::info!(
            "requesting schedule: {} selected, {} candidates, {} -> {}",
            request.selected_places.len(),
            request.candidate_places.len(),
            request.start_datetime,
            request.end_datetime
        );

        let resp = self.http.post(self.endpoint()).json(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ScheduleError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Turn the service's response into itinerary days.
///
/// A numbered day `n` becomes day `n` of the trip, so gaps stay as empty days.
/// Labelled days (`"Sun"`) follow the numbered ones in order of first appearance
/// in `route_summary`, then in `schedule`. Day numbers past [`MAX_TRIP_DAYS`] are
/// dropped. Entries are matched back to `places` by id, then by name; unknown
/// entries are skipped. Malformed route token lists leave that day without a route.
pub fn to_itinerary(
    response: &GenerateScheduleResponse,
    places: &[Place],
    start: NaiveDateTime,
) -> Vec<ItineraryDay> {
    let refs: Vec<DayRef> = response
        .route_summary
        .iter()
        .map(|summary| summary.day.clone())
        .chain(response.schedule.iter().map(ScheduleEntry::day_ref))
        .collect();

    let numbered = refs
        .iter()
        .filter_map(DayRef::number)
        .filter(|n| *n <= MAX_TRIP_DAYS)
        .max()
        .unwrap_or(0) as usize;
    let mut labels: Vec<&str> = Vec::new();
    for day in &refs {
        if let DayRef::Label(label) = day {
            let label = label.trim();
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
    }
    let day_of = |day: &DayRef| -> Option<usize> {
        match day {
            DayRef::Number(_) => day
                .number()
                .filter(|n| *n <= MAX_TRIP_DAYS)
                .map(|n| n as usize - 1),
            DayRef::Label(label) => {
                let label = label.trim();
                labels.iter().position(|l| *l == label).map(|idx| numbered + idx)
            }
        }
    };
    let day_count = numbered + labels.len();

    let summaries: Vec<(usize, &RouteSummary)> = response
        .route_summary
        .iter()
        .filter_map(|summary| Some((day_of(&summary.day)?, summary)))
        .collect();
    let entries: Vec<(usize, &ScheduleEntry)> = response
        .schedule
        .iter()
        .filter_map(|entry| Some((day_of(&entry.day_ref())?, entry)))
        .collect();
    if summaries.len() + entries.len() < refs.len() {
        tracing::warn!("schedule service referenced days past {MAX_TRIP_DAYS}, dropped");
    }

    let by_id: HashMap<i64, &Place> = places.iter().map(|p| (p.id, p)).collect();
    let by_name: HashMap<&str, &Place> = places.iter().map(|p| (p.name.as_str(), p)).collect();

    let mut days: Vec<ItineraryDay> = (0..day_count)
        .map(|idx| ItineraryDay {
            day: idx as u32 + 1,
            date: Some((start.date() + ChronoDuration::days(idx as i64)).format("%Y-%m-%d").to_string()),
            places: Vec::new(),
            total_distance_km: 0.0,
            interleaved_route: Vec::new(),
            segments: Vec::new(),
        })
        .collect();

    for (idx, entry) in entries {
        let place = entry
            .id
            .and_then(|id| by_id.get(&id))
            .or_else(|| entry.place_name.as_deref().and_then(|n| by_name.get(n)));
        let Some(place) = place else {
            tracing::debug!("schedule entry {:?} matches no known place", entry.place_name);
            continue;
        };
        days[idx].places.push(ItineraryPlace {
            place: (*place).clone(),
            arrive_time: entry.arrive_time.clone().or_else(|| entry.time_block.clone()),
            depart_time: entry.depart_time.clone(),
            stay_minutes: None,
        });
    }

    for (idx, summary) in summaries {
        let day = &mut days[idx];
        day.total_distance_km = summary.total_distance_m / 1000.0;
        match parse_route_tokens(&summary.interleaved_route) {
            Ok(route) => day.interleaved_route = route_tokens(&route, &summary.interleaved_route),
            Err(err) => tracing::warn!("day {}: {err}", day.day),
        }
        if let Some(status) = summary.status.as_deref().filter(|s| *s != "success") {
            tracing::warn!("day {}: schedule service reported route status `{status}`", day.day);
        }
    }

    days
}

/// Numeric form of tokens that already parsed cleanly.
fn route_tokens(route: &ParsedRoute, raw: &[RouteToken]) -> Vec<u64> {
    if route.is_empty() {
        return Vec::new();
    }
    raw.iter()
        .filter_map(|token| match token {
            RouteToken::Id(id) => Some(*id),
            RouteToken::Text(text) => text.trim().parse().ok(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::models::Category;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    fn places() -> Vec<Place> {
        vec![
            Place::new(1, "성산일출봉", Category::Attraction),
            Place::new(2, "해녀의집", Category::Restaurant),
            Place::new(3, "우도 카페", Category::Cafe),
        ]
    }

    #[test]
    fn request_uses_iso_datetimes_and_stubs() {
        let end = start() + ChronoDuration::days(2);
        let request = GenerateScheduleRequest::new(&places()[..2], &places()[2..], start(), end);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["start_datetime"], "2025-06-01T10:00:00");
        assert_eq!(value["end_datetime"], "2025-06-03T10:00:00");
        assert_eq!(value["selected_places"], json!([{"id": 1, "name": "성산일출봉"}, {"id": 2, "name": "해녀의집"}]));
        assert_eq!(value["candidate_places"][0]["id"], 3);
    }

    #[test]
    fn converts_response_grouped_by_day_label() {
        let response: GenerateScheduleResponse = serde_json::from_value(json!({
            "schedule": [
                {"id": 1, "place_name": "성산일출봉", "day": "Sun", "time_block": "10:00"},
                {"name": "해녀의집", "day": "Sun", "arrival_time": "12:00", "departure_time": "13:00"},
                {"id": 3, "day": "Mon"},
                {"id": 99, "day": "Mon"}
            ],
            "route_summary": [
                {"day": "Sun", "status": "success", "total_distance_m": 12500,
                 "interleaved_route": [1, 10, "2", 11, 3], "places_routed": ["성산일출봉", "해녀의집"]},
                {"day": "Mon", "status": "partial", "total_distance_m": 800,
                 "interleaved_route": [4, 12]}
            ],
            "extra": "ignored"
        }))
        .unwrap();

        let days = to_itinerary(&response, &places(), start());
        assert_eq!(days.len(), 2);

        assert_eq!(days[0].day, 1);
        assert_eq!(days[0].date.as_deref(), Some("2025-06-01"));
        assert_eq!(days[0].places.len(), 2);
        assert_eq!(days[0].places[0].arrive_time.as_deref(), Some("10:00"));
        assert_eq!(days[0].places[1].place.id, 2);
        assert_eq!(days[0].places[1].depart_time.as_deref(), Some("13:00"));
        assert_eq!(days[0].total_distance_km, 12.5);
        assert_eq!(days[0].interleaved_route, vec![1, 10, 2, 11, 3]);

        assert_eq!(days[1].date.as_deref(), Some("2025-06-02"));
        assert_eq!(days[1].places.len(), 1);
        assert!(days[1].interleaved_route.is_empty());
    }

    #[test]
    fn schedule_without_summary_defaults_to_day_one() {
        let response: GenerateScheduleResponse =
            serde_json::from_value(json!({"schedule": [{"id": 2}, {"id": 3, "day": 2}]})).unwrap();
        let days = to_itinerary(&response, &places(), start());
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].places[0].place.id, 2);
        assert_eq!(days[1].places[0].place.id, 3);
    }

    #[test]
    fn numbered_days_keep_their_position() {
        let response: GenerateScheduleResponse = serde_json::from_value(json!({
            "schedule": [
                {"id": 2, "day": 2},
                {"id": 1, "day": 1},
                {"id": 3, "day": "extra"}
            ],
            "route_summary": [{"day": 2, "total_distance_m": 3000}]
        }))
        .unwrap();

        let days = to_itinerary(&response, &places(), start());
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].places[0].place.id, 1);
        assert_eq!(days[0].total_distance_km, 0.0);
        assert_eq!(days[1].places[0].place.id, 2);
        assert_eq!(days[1].date.as_deref(), Some("2025-06-02"));
        assert_eq!(days[1].total_distance_km, 3.0);
        assert_eq!(days[2].places[0].place.id, 3);
    }

    #[test]
    fn later_day_number_leaves_earlier_days_empty() {
        let response: GenerateScheduleResponse =
            serde_json::from_value(json!({"schedule": [{"id": 1, "day": 3}, {"id": 2, "day": 400}]})).unwrap();
        let days = to_itinerary(&response, &places(), start());
        assert_eq!(days.len(), 3);
        assert!(days[0].places.is_empty() && days[1].places.is_empty());
        assert_eq!(days[2].day, 3);
        assert_eq!(days[2].date.as_deref(), Some("2025-06-03"));
        assert_eq!(days[2].places.len(), 1);
    }

    #[test]
    fn only_server_errors_are_retried() {
        let server = ScheduleError::Status { status: 503, body: String::new() };
        let client = ScheduleError::Status { status: 422, body: String::new() };
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = ScheduleClient::new("http://scheduler.local/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.endpoint(), "http://scheduler.local/generate_schedule");
    }
}

use std::collections::HashSet;

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::{
    models::{Category, Coordinate, ItineraryDay, ItineraryPlace, NodeId, ParsedRoute, Place},
    network::RoadNetwork,
    places::place_weight,
    prompt::{default_end_time, default_start_time},
    route_parser::parse_interleaved_route,
    routing::{approximate_distance_km, haversine_km},
};

pub const DEFAULT_STAY_MINUTES: u32 = 60;
/// Longest trip, in days, a schedule is built for.
pub const MAX_TRIP_DAYS: u32 = 30;
/// Upper bound on the per-category auto-fill target per day.
pub const MAX_PLACES_PER_DAY: usize = 20;
/// Average driving speed on the island's local roads.
pub const TRAVEL_SPEED_KMH: f64 = 30.0;

/// How many places of `category` a trip of `days` days needs.
/// Accommodation is one per night; everything else `per_day` per day.
pub fn category_target(category: Category, days: u32, per_day: usize) -> usize {
    match category {
        Category::Accommodation => days.saturating_sub(1).max(1) as usize,
        _ => (days as usize).saturating_mul(per_day),
    }
}

/// Top-weighted places from `pool` that top each category up to its target.
/// Returned places are flagged `is_candidate`.
pub fn fill_candidates(selected: &[Place], pool: &[Place], days: u32, per_day: usize) -> Vec<Place> {
    let taken: HashSet<(Category, i64)> = selected.iter().map(|p| (p.category, p.id)).collect();
    let mut candidates = Vec::new();

    for category in Category::ALL {
        let have = selected.iter().filter(|p| p.category == category).count();
        let need = category_target(category, days, per_day).saturating_sub(have);
        if need == 0 {
            continue;
        }

        let mut available: Vec<&Place> = pool
            .iter()
            .filter(|p| p.category == category && !taken.contains(&(p.category, p.id)))
            .collect();
        available.sort_by(|a, b| {
            let wa = a.weight.unwrap_or_else(|| place_weight(a, &[]));
            let wb = b.weight.unwrap_or_else(|| place_weight(b, &[]));
            wb.total_cmp(&wa).then_with(|| a.id.cmp(&b.id))
        });

        let added = available.into_iter().take(need).map(|place| {
            let mut place = place.clone();
            place.is_candidate = true;
            place
        });
        let before = candidates.len();
        candidates.extend(added);
        tracing::debug!(
            "{category}: {have} selected, auto-filled {} of {need} missing",
            candidates.len() - before
        );
    }

    candidates
}

/// Order places greedily: always go to the nearest unvisited place next.
pub fn nearest_neighbour_order(places: &[Place]) -> Vec<Place> {
    let (mut remaining, unplaced): (Vec<&Place>, Vec<&Place>) =
        places.iter().partition(|p| p.coordinate().is_some());
    if !unplaced.is_empty() {
        tracing::warn!("{} places without coordinates left out of the itinerary", unplaced.len());
    }

    let mut ordered = Vec::with_capacity(remaining.len());
    if remaining.is_empty() {
        return ordered;
    }
    let mut current = remaining.remove(0);
    ordered.push(current.clone());

    while !remaining.is_empty() {
        let here = coordinate_of(current);
        let (idx, _) = remaining
            .iter()
            .enumerate()
            .map(|(idx, p)| (idx, haversine_km(here, coordinate_of(p))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));
        current = remaining.remove(idx);
        ordered.push(current.clone());
    }
    ordered
}

fn coordinate_of(place: &Place) -> Coordinate {
    place.coordinate().unwrap_or(Coordinate { lat: 0.0, lon: 0.0 })
}

/// Local schedule used when the scheduling service is unavailable: places in
/// nearest-neighbour order, split evenly over the trip's days, each visited for
/// [`DEFAULT_STAY_MINUTES`] with travel at [`TRAVEL_SPEED_KMH`].
pub fn build_local_itinerary(
    places: &[Place],
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Vec<ItineraryDay> {
    let day_count = ((end.date() - start.date()).num_days() + 1).max(1) as usize;
    let ordered = nearest_neighbour_order(places);
    let per_day = ordered.len().div_ceil(day_count).max(1);

    let mut days = Vec::with_capacity(day_count);
    let mut chunks = ordered.chunks(per_day);
    for index in 0..day_count {
        let date = start.date() + Duration::days(index as i64);
        let first_time = if index == 0 { start.time() } else { default_start_time() };
        let stops = chunks.next().unwrap_or_default();

        let mut clock = date.and_time(first_time);
        let mut visits = Vec::with_capacity(stops.len());
        for (i, place) in stops.iter().enumerate() {
            if i > 0 {
                let km = haversine_km(coordinate_of(&stops[i - 1]), coordinate_of(place));
                clock += travel_time(km);
            }
            let arrive = clock;
            clock += Duration::minutes(i64::from(DEFAULT_STAY_MINUTES));
            visits.push(ItineraryPlace {
                place: place.clone(),
                arrive_time: Some(clock_label(arrive.time())),
                depart_time: Some(clock_label(clock.time())),
                stay_minutes: Some(DEFAULT_STAY_MINUTES),
            });
        }

        let day_end = if index + 1 == day_count { end.time() } else { default_end_time() };
        if clock > date.and_time(day_end) {
            tracing::debug!("day {} runs past {}", index + 1, clock_label(day_end));
        }

        let coords: Vec<Coordinate> = stops.iter().map(coordinate_of).collect();
        days.push(ItineraryDay {
            day: index as u32 + 1,
            date: Some(date.format("%Y-%m-%d").to_string()),
            places: visits,
            total_distance_km: approximate_distance_km(&coords),
            interleaved_route: Vec::new(),
            segments: Vec::new(),
        });
    }
    days
}

fn travel_time(km: f64) -> Duration {
    Duration::minutes((km / TRAVEL_SPEED_KMH * 60.0).ceil() as i64)
}

/// Interleaved token list for a parsed route; inverse of
/// [`parse_interleaved_route`].
pub fn interleave(route: &ParsedRoute) -> Option<Vec<u64>> {
    let first = route.segments.first()?;
    let mut tokens = vec![first.from];
    for segment in &route.segments {
        let [link] = segment.links.as_slice() else {
            return None;
        };
        tokens.push(*link);
        tokens.push(segment.to);
    }
    Some(tokens)
}

/// Road route visiting the places' mapped nodes in order, by chained BFS.
/// `None` when a place is unmapped or two consecutive nodes cannot be joined by links.
pub fn route_through_places(network: &RoadNetwork, places: &[Place]) -> Option<ParsedRoute> {
    let stops: Vec<NodeId> = places
        .iter()
        .map(|p| p.geo_node_id)
        .collect::<Option<Vec<_>>>()?;

    let mut nodes: Vec<NodeId> = Vec::new();
    for pair in stops.windows(2) {
        let path = network.find_node_path(pair[0], pair[1]);
        if path.fallback {
            return None;
        }
        let skip = usize::from(!nodes.is_empty());
        nodes.extend(path.nodes.into_iter().skip(skip));
    }
    if nodes.len() < 2 {
        return None;
    }

    let route = network.path_to_route(&nodes);
    route
        .segments
        .iter()
        .all(|s| s.links.len() == 1)
        .then_some(route)
}

/// Decode each day's interleaved route and, when the road network is known,
/// replace the straight-line distance with the road distance. Days with a
/// malformed route keep their segments empty. Returns the number of routed days.
pub fn attach_routes(days: &mut [ItineraryDay], network: Option<&RoadNetwork>) -> usize {
    let mut routed = 0;
    for day in days.iter_mut() {
        if day.interleaved_route.is_empty() {
            if let Some(route) = network.and_then(|n| route_through_places(n, &day_places(day))) {
                day.interleaved_route = interleave(&route).unwrap_or_default();
            }
        }

        match parse_interleaved_route(&day.interleaved_route) {
            Ok(route) if !route.is_empty() => {
                if let Some(network) = network {
                    day.total_distance_km = network.route_distance_km(&route);
                }
                day.segments = route.segments;
                routed += 1;
            }
            Ok(_) => day.segments.clear(),
            Err(err) => {
                tracing::warn!("day {}: {err}; route not drawn", day.day);
                day.segments.clear();
            }
        }
    }
    routed
}

pub fn total_distance_km(days: &[ItineraryDay]) -> f64 {
    days.iter().map(|d| d.total_distance_km).sum()
}

fn day_places(day: &ItineraryDay) -> Vec<Place> {
    day.places.iter().map(|p| p.place.clone()).collect()
}

pub fn clock_label(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::models::{Coordinate, ItineraryDay};

const CREATOR: &str = "jeju-backend";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to build GPX document: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("day {0} has nothing to export")]
    Empty(u32),
}

/// GPX 1.1 for one itinerary day, base64-encoded.
///
/// The track follows `geometry` when given, otherwise the straight line
/// through the day's places. Every place with a position becomes a waypoint.
pub fn encode_day_as_gpx(day: &ItineraryDay, geometry: &[Coordinate]) -> Result<String, ExportError> {
    let stops: Vec<(Coordinate, &str)> = day
        .places
        .iter()
        .filter_map(|stop| Some((stop.place.coordinate()?, stop.place.name.as_str())))
        .collect();

    let track_points: Vec<Coordinate> = if geometry.is_empty() {
        stops.iter().map(|(coord, _)| *coord).collect()
    } else {
        geometry.to_vec()
    };
    if track_points.is_empty() {
        return Err(ExportError::Empty(day.day));
    }

    let title = match &day.date {
        Some(date) => format!("Day {} ({date})", day.day),
        None => format!("Day {}", day.day),
    };
    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(title),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(track_points.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    for (coord, name) in stops {
        let mut waypoint = to_waypoint(&coord);
        waypoint.name = Some(name.to_string());
        gpx.waypoints.push(waypoint);
    }

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}

use crate::models::Coordinate;

pub const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    haversine_km(a, b) * 1000.0
}

pub fn approximate_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Point `distance_m` metres due north of `origin`.
pub fn offset_north_m(origin: Coordinate, distance_m: f64) -> Coordinate {
    let dlat = (distance_m / 1000.0 / EARTH_RADIUS_KM).to_degrees();
    Coordinate {
        lat: origin.lat + dlat,
        lon: origin.lon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let point = Coordinate { lat: 33.5, lon: 126.5 };
        assert_eq!(haversine_km(point, point), 0.0);
    }

    #[test]
    fn test_haversine_symmetry() {
        let a = Coordinate { lat: 33.499, lon: 126.531 };
        let b = Coordinate { lat: 33.253, lon: 126.560 };
        assert_eq!(haversine_km(a, b), haversine_km(b, a));
    }

    #[test]
    fn test_jeju_city_to_seogwipo() {
        // Jeju City hall to Seogwipo city hall is roughly 27 km as the crow flies.
        let jeju = Coordinate { lat: 33.4996, lon: 126.5312 };
        let seogwipo = Coordinate { lat: 33.2541, lon: 126.5600 };
        let d = haversine_km(jeju, seogwipo);
        assert!((26.0..29.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_offset_north_matches_haversine() {
        let origin = Coordinate { lat: 33.45, lon: 126.55 };
        let moved = offset_north_m(origin, 150.0);
        assert!((haversine_m(origin, moved) - 150.0).abs() < 0.01);
    }

    #[test]
    fn test_approximate_distance_empty() {
        assert_eq!(approximate_distance_km(&[]), 0.0);
    }

    #[test]
    fn test_approximate_distance_single_point() {
        let path = vec![Coordinate { lat: 33.5, lon: 126.5 }];
        assert_eq!(approximate_distance_km(&path), 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lon)| Coordinate { lat, lon })
        }

        proptest! {
            #[test]
            fn prop_haversine_non_negative(a in valid_coord(), b in valid_coord()) {
                prop_assert!(haversine_km(a, b) >= 0.0);
            }

            #[test]
            fn prop_haversine_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-10);
            }

            #[test]
            fn prop_haversine_bounded_by_half_earth_circumference(
                a in valid_coord(),
                b in valid_coord()
            ) {
                let max_distance = std::f64::consts::PI * EARTH_RADIUS_KM;
                prop_assert!(haversine_km(a, b) <= max_distance + 0.1);
            }

            #[test]
            fn prop_haversine_triangle_inequality(
                a in valid_coord(),
                b in valid_coord(),
                c in valid_coord()
            ) {
                let dist_ab = haversine_km(a, b);
                let dist_bc = haversine_km(b, c);
                let dist_ac = haversine_km(a, c);
                prop_assert!(dist_ac <= dist_ab + dist_bc + 1e-6);
            }

            #[test]
            fn prop_approximate_distance_additive(
                path1 in prop::collection::vec(valid_coord(), 2..5),
                path2 in prop::collection::vec(valid_coord(), 2..5)
            ) {
                let dist1 = approximate_distance_km(&path1);
                let dist2 = approximate_distance_km(&path2);

                let mut combined = path1.clone();
                combined.extend_from_slice(&path2);
                let dist_combined = approximate_distance_km(&combined);

                let connection = haversine_km(*path1.last().unwrap(), path2[0]);
                prop_assert!((dist_combined - (dist1 + connection + dist2)).abs() < 1e-6);
            }
        }
    }
}

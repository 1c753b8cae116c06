//! Canonical view over loosely-typed table rows.
//!
//! The place tables do not agree on column casing (`Longitude`, `LONGITUDE`,
//! `x`, `place_name`, `PlaceName`, ...). Rows are normalised once into a
//! [`NormalizedRow`] keyed by [`PlaceField`], so the rest of the crate never
//! looks at raw keys.

use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceField {
    Id,
    Name,
    Address,
    RoadAddress,
    Longitude,
    Latitude,
    Rating,
    ReviewCount,
    VisitorReviewCount,
    BlogReviewCount,
    NaverLink,
    InstagramLink,
    Homepage,
    CategoryDetail,
}

impl PlaceField {
    pub const ALL: [PlaceField; 14] = [
        PlaceField::Id,
        PlaceField::Name,
        PlaceField::Address,
        PlaceField::RoadAddress,
        PlaceField::Longitude,
        PlaceField::Latitude,
        PlaceField::Rating,
        PlaceField::ReviewCount,
        PlaceField::VisitorReviewCount,
        PlaceField::BlogReviewCount,
        PlaceField::NaverLink,
        PlaceField::InstagramLink,
        PlaceField::Homepage,
        PlaceField::CategoryDetail,
    ];

    /// Accepted keys, already in [`normalize_key`] form, highest priority first.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            PlaceField::Id => &["id", "placeid"],
            PlaceField::Name => &["placename", "name", "title"],
            PlaceField::Address => &["address", "lotaddress", "jibunaddress", "addr"],
            PlaceField::RoadAddress => &["roadaddress", "roadaddr", "roadnameaddress"],
            PlaceField::Longitude => &["longitude", "lon", "lng", "x"],
            PlaceField::Latitude => &["latitude", "lat", "y"],
            PlaceField::Rating => &["rating", "starrating", "score"],
            PlaceField::ReviewCount => &["reviewcount", "totalreviewcount", "reviews"],
            PlaceField::VisitorReviewCount => &["visitorreviewcount", "visitorreviews"],
            PlaceField::BlogReviewCount => &["blogreviewcount", "blogreviews"],
            PlaceField::NaverLink => &["link", "naverlink", "naverurl", "naverplacelink"],
            PlaceField::InstagramLink => &["instagram", "instagramlink", "instagramurl"],
            PlaceField::Homepage => &["homepage", "homepageurl", "website"],
            PlaceField::CategoryDetail => &[
                "categorydetail",
                "detailcategory",
                "subcategory",
                "categories",
                "category",
            ],
        }
    }
}

/// Lowercase and drop `_`, `-` and whitespace: `Place_Name` and `place-name`
/// both become `placename`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    values: HashMap<PlaceField, Value>,
}

impl NormalizedRow {
    /// `None` unless `value` is a JSON object.
    pub fn from_json(value: &Value) -> Option<Self> {
        value.as_object().map(Self::from_map)
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut by_key: HashMap<String, &Value> = HashMap::with_capacity(map.len());
        for (key, value) in map {
            if is_present(value) {
                by_key.entry(normalize_key(key)).or_insert(value);
            }
        }

        let values = PlaceField::ALL
            .iter()
            .filter_map(|&field| {
                field
                    .aliases()
                    .iter()
                    .find_map(|alias| by_key.get(*alias))
                    .map(|value| (field, (*value).clone()))
            })
            .collect();

        Self { values }
    }

    pub fn has(&self, field: PlaceField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn text(&self, field: PlaceField) -> Option<String> {
        match self.values.get(&field)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Numbers, or strings such as `"4.5"` and `"1,234"`.
    pub fn number(&self, field: PlaceField) -> Option<f64> {
        let number: Option<f64> = match self.values.get(&field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().replace(',', "").parse().ok(),
            _ => None,
        };
        number.filter(|n| n.is_finite())
    }

    pub fn count(&self, field: PlaceField) -> Option<u32> {
        self.number(field)
            .filter(|n| *n >= 0.0)
            .map(|n| n.round().min(u32::MAX as f64) as u32)
    }

    pub fn id(&self) -> Option<i64> {
        match self.values.get(&PlaceField::Id)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn keys_are_normalized() {
        assert_eq!(normalize_key("Place_Name"), "placename");
        assert_eq!(normalize_key("ROAD-ADDRESS"), "roadaddress");
        assert_eq!(normalize_key(" visitor review count "), "visitorreviewcount");
    }

    #[test]
    fn mixed_casing_resolves_to_canonical_fields() {
        for row in [
            json!({"ID": 3, "Place_Name": "협재해수욕장", "LONGITUDE": 126.2396, "Latitude": "33.3940"}),
            json!({"id": "3", "placename": "협재해수욕장", "x": "126.2396", "y": 33.394}),
        ] {
            let row = NormalizedRow::from_json(&row).unwrap();
            assert_eq!(row.id(), Some(3));
            assert_eq!(row.text(PlaceField::Name).as_deref(), Some("협재해수욕장"));
            assert_eq!(row.number(PlaceField::Longitude), Some(126.2396));
            assert_eq!(row.number(PlaceField::Latitude), Some(33.394));
        }
    }

    #[test]
    fn alias_priority_wins_over_map_order() {
        let row = NormalizedRow::from_json(&json!({"x": 1.0, "longitude": 126.5})).unwrap();
        assert_eq!(row.number(PlaceField::Longitude), Some(126.5));
    }

    #[test]
    fn empty_values_fall_through_to_next_alias() {
        let row = NormalizedRow::from_json(&json!({"longitude": "  ", "lng": 126.5, "rating": null}))
            .unwrap();
        assert_eq!(row.number(PlaceField::Longitude), Some(126.5));
        assert!(!row.has(PlaceField::Rating));
    }

    #[test]
    fn numeric_strings_with_separators() {
        let row = NormalizedRow::from_json(&json!({"visitor_review_count": "1,234", "rating": "4.5"}))
            .unwrap();
        assert_eq!(row.count(PlaceField::VisitorReviewCount), Some(1234));
        assert_eq!(row.number(PlaceField::Rating), Some(4.5));
    }

    #[test]
    fn garbage_numbers_are_absent() {
        let row = NormalizedRow::from_json(&json!({"rating": "n/a", "review_count": -3})).unwrap();
        assert_eq!(row.number(PlaceField::Rating), None);
        assert_eq!(row.count(PlaceField::ReviewCount), None);
    }

    #[test]
    fn non_objects_are_rejected() {
        assert!(NormalizedRow::from_json(&json!([1, 2])).is_none());
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    models::{Category, Place},
    normalize::{NormalizedRow, PlaceField},
};

/// Companion tables keyed by the information table's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceTable {
    Information,
    Rating,
    Link,
    Categories,
    Review,
}

impl PlaceTable {
    pub fn suffix(self) -> &'static str {
        match self {
            PlaceTable::Information => "information",
            PlaceTable::Rating => "rating",
            PlaceTable::Link => "link",
            PlaceTable::Categories => "categories",
            PlaceTable::Review => "review",
        }
    }
}

pub fn table_name(category: Category, table: PlaceTable) -> String {
    format!("{}_{}", category.table_prefix(), table.suffix())
}

/// Raw rows of the four per-category tables.
#[derive(Debug, Clone, Default)]
pub struct CategoryRows {
    pub information: Vec<Value>,
    pub rating: Vec<Value>,
    pub link: Vec<Value>,
    pub categories: Vec<Value>,
}

/// Join the per-category tables by id. Information rows drive the output;
/// companion rows without a matching information row are ignored.
pub fn merge_category_rows(category: Category, rows: &CategoryRows) -> Vec<Place> {
    let index = |values: &[Value]| -> HashMap<i64, NormalizedRow> {
        values
            .iter()
            .filter_map(NormalizedRow::from_json)
            .filter_map(|row| Some((row.id()?, row)))
            .collect()
    };
    let ratings = index(&rows.rating);
    let links = index(&rows.link);
    let details = index(&rows.categories);

    let mut skipped = 0usize;
    let places: Vec<Place> = rows
        .information
        .iter()
        .filter_map(|value| {
            let info = NormalizedRow::from_json(value);
            let place = info
                .as_ref()
                .and_then(|info| build_place(category, info, &ratings, &links, &details));
            if place.is_none() {
                skipped += 1;
            }
            place
        })
        .collect();

    if skipped > 0 {
        tracing::warn!("{category}: skipped {skipped} information rows without id or name");
    }
    tracing::debug!("{category}: merged {} places", places.len());
    places
}

fn build_place(
    category: Category,
    info: &NormalizedRow,
    ratings: &HashMap<i64, NormalizedRow>,
    links: &HashMap<i64, NormalizedRow>,
    details: &HashMap<i64, NormalizedRow>,
) -> Option<Place> {
    let id = info.id()?;
    let name = info.text(PlaceField::Name)?;
    let mut place = Place::new(id, name, category);

    place.address = info.text(PlaceField::Address).unwrap_or_default();
    place.road_address = info.text(PlaceField::RoadAddress);
    place.x = info.number(PlaceField::Longitude);
    place.y = info.number(PlaceField::Latitude);

    if let Some(rating) = ratings.get(&id) {
        place.rating = rating.number(PlaceField::Rating).unwrap_or(0.0).clamp(0.0, 5.0);
        place.review_count = review_count(rating);
    }
    if let Some(link) = links.get(&id) {
        place.naver_link = link.text(PlaceField::NaverLink);
        place.instagram_link = link.text(PlaceField::InstagramLink);
        place.homepage = link.text(PlaceField::Homepage);
    }
    place.category_detail = details
        .get(&id)
        .and_then(|row| row.text(PlaceField::CategoryDetail))
        .or_else(|| info.text(PlaceField::CategoryDetail));

    Some(place)
}

/// An explicit total wins; otherwise visitor and blog counts are summed.
fn review_count(row: &NormalizedRow) -> u32 {
    row.count(PlaceField::ReviewCount).unwrap_or_else(|| {
        let visitor = row.count(PlaceField::VisitorReviewCount).unwrap_or(0);
        let blog = row.count(PlaceField::BlogReviewCount).unwrap_or(0);
        visitor.saturating_add(blog)
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub text: String,
    /// 1-based rank; `None` for unranked keywords.
    pub rank: Option<usize>,
}

impl Keyword {
    pub fn ranked(text: impl Into<String>, rank: usize) -> Self {
        Self { text: text.into(), rank: Some(rank) }
    }

    pub fn unranked(text: impl Into<String>) -> Self {
        Self { text: text.into(), rank: None }
    }
}

const UNRANKED_BOOST: f64 = 0.25;

/// Relevance weight of a place for the given keywords.
///
/// `rating × ln(1 + reviews)`, scaled by `1 + Σ boost` over keywords found in the
/// place's name, category detail or address. A ranked keyword at rank `r` of `n`
/// boosts by `(n - r + 1) / n`; unranked keywords boost by 0.25.
pub fn place_weight(place: &Place, keywords: &[Keyword]) -> f64 {
    let base = place.rating.max(0.0) * (1.0 + f64::from(place.review_count)).ln();
    let ranked_total = keywords.iter().filter(|k| k.rank.is_some()).count().max(1) as f64;

    let haystack = format!(
        "{} {} {}",
        place.name,
        place.category_detail.as_deref().unwrap_or_default(),
        place.address
    )
    .to_lowercase();

    let boost: f64 = keywords
        .iter()
        .filter(|k| {
            let needle = k.text.trim().to_lowercase();
            !needle.is_empty() && haystack.contains(&needle)
        })
        .map(|k| match k.rank {
            Some(rank) => ((ranked_total - rank as f64 + 1.0) / ranked_total).clamp(0.0, 1.0),
            None => UNRANKED_BOOST,
        })
        .sum();

    let weight = base * (1.0 + boost);
    if weight.is_finite() { weight } else { 0.0 }
}

/// Fill `weight` and sort by descending weight, ties broken by name.
pub fn rank_places(places: &mut [Place], keywords: &[Keyword]) {
    for place in places.iter_mut() {
        place.weight = Some(place_weight(place, keywords));
    }
    places.sort_by(|a, b| {
        b.weight
            .unwrap_or(0.0)
            .total_cmp(&a.weight.unwrap_or(0.0))
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[derive(Debug, Clone, Default)]
pub struct PlaceFilter {
    pub query: Option<String>,
    pub min_rating: Option<f64>,
    pub categories: Vec<Category>,
}

impl PlaceFilter {
    pub fn matches(&self, place: &Place) -> bool {
        if !self.categories.is_empty() && !self.categories.contains(&place.category) {
            return false;
        }
        if let Some(min) = self.min_rating {
            if place.rating < min {
                return false;
            }
        }
        match self.query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => {
                let query = query.to_lowercase();
                [
                    Some(place.name.as_str()),
                    Some(place.address.as_str()),
                    place.road_address.as_deref(),
                    place.category_detail.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&query))
            }
            _ => true,
        }
    }
}

pub fn filter_places(places: Vec<Place>, filter: &PlaceFilter) -> Vec<Place> {
    places.into_iter().filter(|p| filter.matches(p)).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cafe_rows() -> CategoryRows {
        CategoryRows {
            information: vec![
                json!({"id": 1, "Place_Name": "카페 바다", "Road_Address": "제주시 애월읍 1", "LONGITUDE": "126.31", "latitude": 33.46}),
                json!({"ID": "2", "place_name": "숲속 카페", "address": "서귀포시 2", "x": 0, "y": 0}),
                json!({"id": 3}),
                json!("not a row"),
            ],
            rating: vec![
                json!({"id": 1, "Rating": "4.6", "visitor_review_count": 120, "blog_review_count": "30"}),
                json!({"id": 2, "rating": 9.0, "review_count": 7}),
            ],
            link: vec![json!({"id": 1, "link": "https://naver.me/x", "instagram": ""})],
            categories: vec![json!({"id": 1, "Categories": "오션뷰 카페"})],
        }
    }

    #[test]
    fn merges_companion_tables_by_id() {
        let places = merge_category_rows(Category::Cafe, &cafe_rows());
        assert_eq!(places.len(), 2);

        let first = &places[0];
        assert_eq!(first.name, "카페 바다");
        assert_eq!(first.road_address.as_deref(), Some("제주시 애월읍 1"));
        assert_eq!(first.rating, 4.6);
        assert_eq!(first.review_count, 150);
        assert_eq!(first.naver_link.as_deref(), Some("https://naver.me/x"));
        assert_eq!(first.instagram_link, None);
        assert_eq!(first.category_detail.as_deref(), Some("오션뷰 카페"));
        assert!(first.coordinate().is_some());

        let second = &places[1];
        assert_eq!(second.id, 2);
        assert_eq!(second.rating, 5.0);
        assert_eq!(second.review_count, 7);
        assert_eq!(second.coordinate(), None);
    }

    #[test]
    fn table_names_use_category_prefix() {
        assert_eq!(table_name(Category::Attraction, PlaceTable::Information), "landmark_information");
        assert_eq!(table_name(Category::Cafe, PlaceTable::Review), "cafe_review");
    }

    #[test]
    fn keyword_matches_raise_weight() {
        let mut place = Place::new(1, "애월 오션뷰 카페", Category::Cafe);
        place.rating = 4.0;
        place.review_count = 99;

        let plain = place_weight(&place, &[]);
        assert!((plain - 4.0 * 100f64.ln()).abs() < 1e-9);

        let top = place_weight(&place, &[Keyword::ranked("오션뷰", 1), Keyword::ranked("조용한", 2)]);
        assert!((top - plain * 2.0).abs() < 1e-9);

        let second = place_weight(&place, &[Keyword::ranked("조용한", 1), Keyword::ranked("오션뷰", 2)]);
        assert!((second - plain * 1.5).abs() < 1e-9);

        let unranked = place_weight(&place, &[Keyword::unranked("카페")]);
        assert!((unranked - plain * 1.25).abs() < 1e-9);
    }

    #[test]
    fn unrated_places_weigh_zero() {
        let place = Place::new(1, "new place", Category::Restaurant);
        assert_eq!(place_weight(&place, &[Keyword::unranked("new")]), 0.0);
    }

    #[test]
    fn rank_orders_by_weight_then_name() {
        let mut a = Place::new(1, "b", Category::Cafe);
        a.rating = 3.0;
        a.review_count = 10;
        let mut b = Place::new(2, "a", Category::Cafe);
        b.rating = 3.0;
        b.review_count = 10;
        let mut c = Place::new(3, "c", Category::Cafe);
        c.rating = 5.0;
        c.review_count = 10;

        let mut places = vec![a, b, c];
        rank_places(&mut places, &[]);
        let ids: Vec<_> = places.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(places.iter().all(|p| p.weight.is_some()));
    }

    #[test]
    fn filter_by_text_rating_and_category() {
        let mut good = Place::new(1, "Haenyeo Kitchen", Category::Restaurant);
        good.rating = 4.7;
        good.address = "구좌읍".into();
        let mut meh = Place::new(2, "Noodle House", Category::Restaurant);
        meh.rating = 3.1;
        let cafe = Place::new(3, "kitchen cafe", Category::Cafe);

        let filter = PlaceFilter {
            query: Some("KITCHEN".into()),
            min_rating: Some(4.0),
            categories: vec![Category::Restaurant],
        };
        let kept = filter_places(vec![good, meh, cafe], &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);

        let by_address = PlaceFilter {
            query: Some("구좌".into()),
            ..Default::default()
        };
        assert!(by_address.matches(&kept[0]));
    }
}

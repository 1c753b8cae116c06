//! Read-only client for the place tables behind Supabase's PostgREST API.

use reqwest::Client;
use serde_json::Value;

use crate::{
    models::{Category, Place},
    places::{CategoryRows, PlaceTable, merge_category_rows, table_name},
};

#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("supabase request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("supabase returned {status} for `{table}`: {body}")]
    Status {
        table: String,
        status: u16,
        body: String,
    },
    #[error("`{0}` did not return a JSON array")]
    NotAnArray(String),
}

#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// `SELECT *` from `table`, with optional PostgREST filters such as `("id", "eq.3")`.
    pub async fn fetch_table(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<Value>, SupabaseError> {
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_string())];
        query.extend(filters.iter().cloned());

        let resp = self
            .client
            .get(self.table_url(table))
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(SupabaseError::Status {
                table: table.to_string(),
                status,
                body,
            });
        }

        match resp.json::<Value>().await? {
            Value::Array(rows) => {
                tracing::debug!("fetched {} rows from {table}", rows.len());
                Ok(rows)
            }
            _ => Err(SupabaseError::NotAnArray(table.to_string())),
        }
    }

    /// Fetch the four tables of a category concurrently and merge them into places.
    pub async fn fetch_places(&self, category: Category) -> Result<Vec<Place>, SupabaseError> {
        let information = table_name(category, PlaceTable::Information);
        let rating = table_name(category, PlaceTable::Rating);
        let link = table_name(category, PlaceTable::Link);
        let categories = table_name(category, PlaceTable::Categories);

        let (information, rating, link, categories) = tokio::try_join!(
            self.fetch_table(&information, &[]),
            self.fetch_table(&rating, &[]),
            self.fetch_table(&link, &[]),
            self.fetch_table(&categories, &[]),
        )?;

        let rows = CategoryRows {
            information,
            rating,
            link,
            categories,
        };
        let places = merge_category_rows(category, &rows);
        tracing::info!("loaded {} {category} places", places.len());
        Ok(places)
    }

    /// Review rows for one place.
    pub async fn fetch_reviews(
        &self,
        category: Category,
        place_id: i64,
    ) -> Result<Vec<Value>, SupabaseError> {
        let table = table_name(category, PlaceTable::Review);
        self.fetch_table(&table, &[("id", format!("eq.{place_id}"))])
            .await
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::core::normalize::normalize;
use crate::models::Listing;
use crate::services::sources::{ListingSource, SearchQuery, SourceError};

pub const SOURCE_NAME: &str = "marketcheck";

/// Zip codes whose 100-mile radius together cover the lower 48
pub const STRATEGIC_HUBS: [&str; 12] = [
    "10001", // New York, NY
    "30303", // Atlanta, GA
    "60601", // Chicago, IL
    "75201", // Dallas, TX
    "80202", // Denver, CO
    "90001", // Los Angeles, CA
    "98101", // Seattle, WA
    "33101", // Miami, FL
    "19102", // Philadelphia, PA
    "85001", // Phoenix, AZ
    "63101", // St. Louis, MO
    "94101", // San Francisco, CA
];

/// Pick the hub to search at `now`
///
/// Advances by one hub every 4 hours so that a 4-hourly schedule walks the
/// whole list.
pub fn hub_for(now: DateTime<Utc>) -> (usize, &'static str) {
    let index = (now.ordinal() as usize * 6 + now.hour() as usize / 4) % STRATEGIC_HUBS.len();
    (index, STRATEGIC_HUBS[index])
}

/// Marketcheck active-inventory API adapter
pub struct MarketcheckSource {
    base_url: String,
    api_key: Option<String>,
    rows: u32,
    radius_miles: u32,
    client: Client,
}

impl MarketcheckSource {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        rows: u32,
        radius_miles: u32,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            rows,
            radius_miles,
            client,
        })
    }

    async fn search_at(
        &self,
        api_key: &str,
        query: &SearchQuery,
        zip: &str,
    ) -> Result<Vec<Listing>, SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("api_key", api_key.to_string()),
            ("rows", self.rows.to_string()),
            ("radius", self.radius_miles.to_string()),
            ("zip", zip.to_string()),
        ];
        if let Some(make) = &query.make {
            params.push(("make", make.clone()));
        }
        if let Some(model) = &query.model {
            params.push(("model", model.clone()));
        }
        if let Some(year_min) = query.year_min {
            params.push(("year_start", year_min.to_string()));
        }
        if let Some(year_max) = query.year_max {
            params.push(("year_end", year_max.to_string()));
        }

        let response = self.client.get(&self.base_url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(SourceError::ApiError(format!(
                "Marketcheck search failed: {}",
                response.status()
            )));
        }

        let json: Value = response.json().await?;

        let items = json
            .get("listings")
            .and_then(|l| l.as_array())
            .ok_or_else(|| SourceError::InvalidResponse("Missing listings array".into()))?;

        Ok(items
            .iter()
            .filter_map(|item| normalize(listing_from_item(item)))
            .collect())
    }
}

#[async_trait]
impl ListingSource for MarketcheckSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn paced(&self) -> bool {
        false
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<Listing>, SourceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::error!("Marketcheck API key missing, skipping search");
            return Ok(vec![]);
        };

        let (hub_index, zip) = hub_for(Utc::now());
        tracing::info!(
            "Searching Marketcheck for {} around {} (hub {})",
            query.label(),
            zip,
            hub_index
        );

        let listings = self.search_at(api_key, query, zip).await?;
        tracing::debug!("Marketcheck returned {} listings for {}", listings.len(), query.label());
        Ok(listings)
    }
}

/// Map one API inventory item into a raw listing
fn listing_from_item(item: &Value) -> Listing {
    let text = |key: &str| item.get(key).and_then(value_to_string);
    let year = number_field(item, "year").map(|y| y as i32);
    let make = text("make");
    let model = text("model");

    let title = text("heading").unwrap_or_else(|| {
        [year.map(|y| y.to_string()), make.clone(), model.clone()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    });

    let location = match (text("city"), text("state")) {
        (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
        (city, state) => city.or(state),
    };

    Listing {
        external_id: text("id").unwrap_or_default(),
        source: SOURCE_NAME.to_string(),
        url: text("vdp_url").unwrap_or_default(),
        title,
        make,
        model,
        year,
        // Marketcheck reports 0 for unknown price or mileage
        price: number_field(item, "price").filter(|p| *p > 0.0),
        mileage: number_field(item, "miles")
            .filter(|m| *m > 0.0)
            .map(|m| m as u32),
        location,
        raw: item.clone(),
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_field(item: &Value, key: &str) -> Option<f64> {
    match item.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;
    use serde_json::json;

    fn source(base_url: String, api_key: Option<&str>) -> MarketcheckSource {
        MarketcheckSource::new(
            base_url,
            api_key.map(String::from),
            50,
            100,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_hub_rotation_advances_every_four_hours() {
        let morning = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 3, 1, 5, 0, 0).unwrap();

        let (a, _) = hub_for(morning);
        let (b, _) = hub_for(later);

        assert_eq!((a + 1) % STRATEGIC_HUBS.len(), b);
    }

    #[test]
    fn test_listing_from_item() {
        let item = json!({
            "id": "mc-123",
            "vdp_url": "https://dealer.example/vdp/123",
            "price": 45000,
            "miles": "12000",
            "year": 1997,
            "make": "Toyota",
            "model": "Supra",
            "city": "Dallas",
            "state": "TX"
        });

        let listing = listing_from_item(&item);

        assert_eq!(listing.external_id, "mc-123");
        assert_eq!(listing.title, "1997 Toyota Supra");
        assert_eq!(listing.price, Some(45000.0));
        assert_eq!(listing.mileage, Some(12000));
        assert_eq!(listing.location.as_deref(), Some("Dallas, TX"));
        assert_eq!(listing.raw, item);
    }

    #[test]
    fn test_zero_price_treated_as_unknown() {
        let listing = listing_from_item(&json!({"id": 7, "heading": "Porsche 911", "price": 0}));
        assert_eq!(listing.external_id, "7");
        assert_eq!(listing.price, None);
    }

    #[tokio::test]
    async fn test_search_parses_listings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/search/car/active")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("api_key".into(), "secret".into()),
                Matcher::UrlEncoded("make".into(), "Porsche".into()),
                Matcher::UrlEncoded("model".into(), "911".into()),
                Matcher::UrlEncoded("year_start".into(), "2019".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "listings": [
                        {"id": "a1", "heading": "2021 Porsche 911 Carrera S", "make": "Porsche", "model": "911", "year": 2021, "price": 139000},
                        {"id": "a2", "heading": "   "}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let source = source(format!("{}/v2/search/car/active", server.url()), Some("secret"));
        let query = SearchQuery {
            make: Some("Porsche".to_string()),
            model: Some("911".to_string()),
            year_min: Some(2019),
            year_max: None,
        };

        let listings = source.search(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].external_id, "a1");
        assert_eq!(listings[0].source, SOURCE_NAME);
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v2/search/car/active")
            .match_query(Matcher::Any)
            .with_status(429)
            .create_async()
            .await;

        let source = source(format!("{}/v2/search/car/active", server.url()), Some("secret"));
        let result = source.search(&SearchQuery::default()).await;

        assert!(matches!(result, Err(SourceError::ApiError(_))));
    }

    #[tokio::test]
    async fn test_missing_api_key_returns_empty() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let source = source(server.url(), None);
        let listings = source.search(&SearchQuery::default()).await.unwrap();

        mock.assert_async().await;
        assert!(listings.is_empty());
    }
}

//! Campaign hourly-views read path.
//!
//! Translated from `original_source/4/src/db.py`'s
//! `ClickHouseDataBaseRepository.get_views`: a single parameterized
//! ClickHouse query returning, per phrase, the reversed per-hour view
//! deltas for the current day.

use clickhouse::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::StoreError;

const VIEWS_QUERY: &str = r#"
SELECT
    phrase,
    arrayReverse(
        arrayFilter(
            x -> x.2 > 0,
            arrayMap(
                (hour_val, diff_val) -> (hour_val, diff_val),
                hours,
                arrayDifference(views_array)
            )
        )
    ) AS views_by_hour
FROM
    (
        SELECT
            phrase,
            groupArray(h) AS hours,
            groupArray(max_v) AS views_array
        FROM
            (
                SELECT
                    phrase,
                    toHour(dt) AS h,
                    max(views) AS max_v
                FROM
                    phrases_views
                WHERE
                    campaign_id = ?
                    AND toDate(dt) = today()
                GROUP BY
                    phrase,
                    h
                ORDER BY
                    h ASC
            )
        GROUP BY
            phrase
    )
"#;

#[derive(Debug, Deserialize, clickhouse::Row)]
struct ViewsRow {
    phrase: String,
    views_by_hour: Vec<(u8, i64)>,
}

/// Read-only ClickHouse client for campaign hourly-views queries.
pub struct CampaignViewsStore {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
    client: Mutex<Option<Client>>,
}

impl CampaignViewsStore {
    pub fn new(host: &str, port: u16, user: &str, password: &str, database: &str) -> Self {
        CampaignViewsStore {
            host: host.to_string(),
            port,
            user: user.to_string(),
            password: password.to_string(),
            database: database.to_string(),
            client: Mutex::new(None),
        }
    }

    pub async fn init(&self) {
        let client = Client::default()
            .with_url(format!("http://{}:{}", self.host, self.port))
            .with_user(&self.user)
            .with_password(&self.password)
            .with_database(&self.database);
        *self.client.lock().await = Some(client);
    }

    /// Returns, for every phrase seen in the current campaign today, the
    /// reversed list of `(hour, delta_views)` pairs where the delta is
    /// positive.
    pub async fn get_views(&self, campaign_id: i32) -> Result<std::collections::HashMap<String, Vec<(u8, i64)>>, StoreError> {
        let client = self.client.lock().await.clone().ok_or(StoreError::NotInitialized)?;
        let rows: Vec<ViewsRow> = client
            .query(VIEWS_QUERY)
            .bind(campaign_id)
            .fetch_all()
            .await?;
        Ok(rows.into_iter().map(|r| (r.phrase, r.views_by_hour)).collect())
    }

    pub async fn close(&self) {
        *self.client.lock().await = None;
    }
}

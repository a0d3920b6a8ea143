// HTTP widget data source - Fetches widget data and report documents from the banking API
use crate::application::widget_data_source::WidgetDataSource;
use crate::domain::report::ReportDocument;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpWidgetDataSource {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DataRequest<'a> {
    data_source: &'a str,
    filters: &'a Value,
}

#[derive(Serialize)]
struct ReportRequest<'a> {
    filters: &'a Value,
}

impl HttpWidgetDataSource {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn widget_url(&self, widget_id: &str, action: &str) -> String {
        format!(
            "{}/widgets/{}/{}",
            self.base_url,
            urlencoding::encode(widget_id),
            action
        )
    }

    async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Data request to {} failed with status {}: {}", url, status, body);
        }
        Ok(response)
    }
}

#[async_trait]
impl WidgetDataSource for HttpWidgetDataSource {
    async fn fetch(&self, widget_id: &str, data_source: &str, filters: &Value) -> Result<Value> {
        let url = self.widget_url(widget_id, "data");
        let response = self
            .post(&url, &DataRequest { data_source, filters })
            .await?;

        response
            .json::<Value>()
            .await
            .context("Failed to parse widget data response")
    }

    async fn fetch_report(&self, widget_id: &str, filters: &Value) -> Result<ReportDocument> {
        let url = self.widget_url(widget_id, "report");
        let response = self.post(&url, &ReportRequest { filters }).await?;

        response
            .json::<ReportDocument>()
            .await
            .context("Failed to parse report document")
    }
}

// Widget data service - Cache-through loading of widget data
use crate::application::query_cache::QueryResultCache;
use crate::application::widget_data_source::WidgetDataSource;
use crate::domain::report::ReportDocument;
use anyhow::Context;
use futures::future::{join_all, AbortHandle, Abortable};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRequest {
    pub widget_id: String,
    pub data_source: Option<String>,
    pub filters: Value,
}

/// Per-widget outcome. A failed fetch stays local to its widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WidgetData {
    #[serde(rename_all = "camelCase")]
    Ready {
        widget_id: String,
        data: Value,
        cached: bool,
    },
    #[serde(rename_all = "camelCase")]
    Error { widget_id: String, message: String },
}

#[derive(Clone)]
pub struct WidgetDataService {
    source: Arc<dyn WidgetDataSource>,
    cache: Arc<QueryResultCache>,
    fetch_timeout: Duration,
}

impl WidgetDataService {
    pub fn new(
        source: Arc<dyn WidgetDataSource>,
        cache: Arc<QueryResultCache>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            fetch_timeout,
        }
    }

    /// Lookup, then fetch on a miss. The fetched value is cached before it is
    /// returned, so the next identical lookup sees it.
    pub async fn load(&self, request: &WidgetRequest) -> WidgetData {
        let widget_id = request.widget_id.clone();

        if let Some(data) = self.cache.get(&widget_id, &request.filters) {
            return WidgetData::Ready {
                widget_id,
                data,
                cached: true,
            };
        }

        let Some(data_source) = request.data_source.as_deref() else {
            return WidgetData::Error {
                widget_id,
                message: "widget has no data source configured".to_string(),
            };
        };

        let fetch = self.source.fetch(&widget_id, data_source, &request.filters);
        match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(data)) => {
                self.cache.set(&widget_id, &request.filters, data.clone());
                WidgetData::Ready {
                    widget_id,
                    data,
                    cached: false,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(widget_id = %widget_id, "widget fetch failed: {:#}", e);
                WidgetData::Error {
                    widget_id,
                    message: format!("{:#}", e),
                }
            }
            Err(_) => {
                tracing::warn!(widget_id = %widget_id, "widget fetch timed out");
                WidgetData::Error {
                    widget_id,
                    message: format!("fetch timed out after {:?}", self.fetch_timeout),
                }
            }
        }
    }

    /// Loads several widgets concurrently; results keep the request order.
    pub async fn load_all(&self, requests: &[WidgetRequest]) -> Vec<WidgetData> {
        join_all(requests.iter().map(|request| self.load(request))).await
    }

    /// Starts a load in the background. Aborting it before the fetch resolves
    /// leaves the cache untouched and the task yields `None`.
    pub fn spawn_load(&self, request: WidgetRequest) -> (JoinHandle<Option<WidgetData>>, AbortHandle) {
        let (abort_handle, registration) = AbortHandle::new_pair();
        let service = self.clone();

        let task = tokio::spawn(async move {
            Abortable::new(async move { service.load(&request).await }, registration)
                .await
                .ok()
        });

        (task, abort_handle)
    }

    pub async fn fetch_report(&self, widget_id: &str, filters: &Value) -> anyhow::Result<ReportDocument> {
        tokio::time::timeout(self.fetch_timeout, self.source.fetch_report(widget_id, filters))
            .await
            .context("report fetch timed out")?
    }

    pub fn invalidate_widget(&self, widget_id: &str) -> usize {
        let removed = self.cache.clear_widget(widget_id);
        tracing::debug!(widget_id, removed, "invalidated widget cache");
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::query_cache::tests::ManualClock;
    use crate::application::query_cache::DEFAULT_TTL;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl WidgetDataSource for FakeSource {
        async fn fetch(&self, widget_id: &str, data_source: &str, filters: &Value) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if data_source == "broken" {
                anyhow::bail!("upstream returned 500");
            }
            Ok(json!({"widget": widget_id, "source": data_source, "filters": filters}))
        }

        async fn fetch_report(&self, _widget_id: &str, _filters: &Value) -> anyhow::Result<ReportDocument> {
            anyhow::bail!("not used")
        }
    }

    fn service(source: Arc<FakeSource>, timeout: Duration) -> (WidgetDataService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(QueryResultCache::with_clock(DEFAULT_TTL, clock.clone()));
        (WidgetDataService::new(source, cache, timeout), clock)
    }

    fn request(widget_id: &str, data_source: &str, filters: Value) -> WidgetRequest {
        WidgetRequest {
            widget_id: widget_id.to_string(),
            data_source: Some(data_source.to_string()),
            filters,
        }
    }

    #[tokio::test]
    async fn test_second_load_is_served_from_cache() {
        let source = Arc::new(FakeSource::default());
        let (service, _) = service(source.clone(), Duration::from_secs(5));
        let req = request("w1", "deposits", json!({"period": "Q1"}));

        let first = service.load(&req).await;
        let second = service.load(&req).await;

        assert!(matches!(first, WidgetData::Ready { cached: false, .. }));
        assert!(matches!(second, WidgetData::Ready { cached: true, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_refetch() {
        let source = Arc::new(FakeSource::default());
        let (service, clock) = service(source.clone(), Duration::from_secs(5));
        let req = request("w1", "deposits", json!({}));

        service.load(&req).await;
        clock.advance(300_001);
        let reloaded = service.load(&req).await;

        assert!(matches!(reloaded, WidgetData::Ready { cached: false, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_stay_local_to_widget() {
        let source = Arc::new(FakeSource::default());
        let (service, _) = service(source, Duration::from_secs(5));
        let requests = vec![
            request("ok", "deposits", json!({})),
            request("bad", "broken", json!({})),
            WidgetRequest {
                widget_id: "unconfigured".into(),
                data_source: None,
                filters: json!({}),
            },
        ];

        let results = service.load_all(&requests).await;

        assert!(matches!(&results[0], WidgetData::Ready { widget_id, .. } if widget_id == "ok"));
        assert!(
            matches!(&results[1], WidgetData::Error { message, .. } if message.contains("500"))
        );
        assert!(matches!(&results[2], WidgetData::Error { .. }));
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let source = Arc::new(FakeSource::default());
        let (service, _) = service(source.clone(), Duration::from_secs(5));
        let req = request("bad", "broken", json!({}));

        service.load(&req).await;
        service.load(&req).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_secs(10)),
        });
        let (service, _) = service(source, Duration::from_millis(20));

        let result = service.load(&request("w1", "deposits", json!({}))).await;

        assert!(matches!(result, WidgetData::Error { message, .. } if message.contains("timed out")));
    }

    #[tokio::test]
    async fn test_aborted_load_does_not_write_cache() {
        let source = Arc::new(FakeSource {
            calls: AtomicUsize::new(0),
            delay: Some(Duration::from_secs(10)),
        });
        let (service, _) = service(source, Duration::from_secs(30));
        let req = request("w1", "deposits", json!({}));

        let (task, abort) = service.spawn_load(req.clone());
        abort.abort();

        assert_eq!(task.await.unwrap(), None);
        assert_eq!(service.cache.get("w1", &req.filters), None);
    }

    #[tokio::test]
    async fn test_invalidate_widget_forces_refetch() {
        let source = Arc::new(FakeSource::default());
        let (service, _) = service(source.clone(), Duration::from_secs(5));
        let req = request("w1", "deposits", json!({"p": 1}));

        service.load(&req).await;
        assert_eq!(service.invalidate_widget("w1"), 1);
        service.load(&req).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}

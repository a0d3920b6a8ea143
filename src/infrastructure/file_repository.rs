// File-backed dashboard repository - One JSON document per dashboard id
use crate::application::dashboard_repository::DashboardRepository;
use crate::domain::dashboard::{DashboardSummary, SavedDashboard};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileDashboardRepository {
    root: PathBuf,
}

impl FileDashboardRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("invalid dashboard id '{}'", id);
        }
        Ok(self.root.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl DashboardRepository for FileDashboardRepository {
    async fn save(&self, dashboard: &SavedDashboard) -> Result<()> {
        let path = self.path_for(&dashboard.id)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let body = serde_json::to_vec_pretty(dashboard).context("Failed to encode dashboard")?;

        // Write then rename, so a reader never sees a half-written file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;

        tracing::debug!(path = %path.display(), bytes = body.len(), "dashboard written");
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<SavedDashboard>> {
        let path = self.path_for(id)?;
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        let saved = serde_json::from_slice(&body)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(saved))
    }

    async fn list(&self) -> Result<Vec<DashboardSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", self.root.display()));
            }
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let parsed = tokio::fs::read(&path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|body| serde_json::from_slice::<SavedDashboard>(&body).map_err(Into::into));
            match parsed {
                Ok(saved) => summaries.push(saved.summary()),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable dashboard: {:#}", e)
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::layout::empty_layouts;
    use chrono::{TimeZone, Utc};

    fn saved(id: &str, name: &str, updated_ms: i64) -> SavedDashboard {
        SavedDashboard {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            theme: "light".to_string(),
            settings: Default::default(),
            layouts: empty_layouts(),
            widgets: Vec::new(),
            configs: Vec::new(),
            updated_at: Utc.timestamp_millis_opt(updated_ms).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDashboardRepository::new(dir.path().join("boards"));
        let dashboard = saved("dash-1", "Retail", 1_000);

        repository.save(&dashboard).await.unwrap();

        assert_eq!(repository.load("dash-1").await.unwrap(), Some(dashboard));
        assert!(dir.path().join("boards/dash-1.json").exists());
        assert!(!dir.path().join("boards/dash-1.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_dashboard() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDashboardRepository::new(dir.path());

        assert_eq!(repository.load("dash-none").await.unwrap(), None);
        assert!(!repository.delete("dash-none").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDashboardRepository::new(dir.path());
        repository.save(&saved("dash-old", "Old", 1_000)).await.unwrap();
        repository.save(&saved("dash-new", "New", 5_000)).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let ids: Vec<String> = repository
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();

        assert_eq!(ids, vec!["dash-new", "dash-old"]);
    }

    #[tokio::test]
    async fn test_list_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDashboardRepository::new(dir.path().join("absent"));
        assert!(repository.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDashboardRepository::new(dir.path());
        repository.save(&saved("dash-2", "Ops", 1_000)).await.unwrap();

        assert!(repository.delete("dash-2").await.unwrap());
        assert_eq!(repository.load("dash-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let repository = FileDashboardRepository::new(dir.path());

        assert!(repository.load("../etc/passwd").await.is_err());
        assert!(repository.delete("").await.is_err());
        assert!(repository.save(&saved("a/b", "x", 0)).await.is_err());
    }
}

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use trendcast_contracts::brand::BrandRecord;
use trendcast_contracts::content::GeneratedContent;
use trendcast_contracts::references::{BrandExample, StyleGallery};
use trendcast_contracts::templates::TemplateSet;
use trendcast_contracts::trends::Trend;
use uuid::Uuid;

use super::{DataStore, ExampleQuery, StoreSnapshot};
use crate::error::{PipelineError, PipelineResult};

/// Store backed by one pretty-printed JSON document.
///
/// Every read reloads the file so separate processes see each other's
/// writes; every write reloads, applies the single mutation and writes the
/// whole document back.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> PipelineResult<StoreSnapshot> {
        read_snapshot(&self.path)
    }

    fn read<T>(&self, op: impl FnOnce(&StoreSnapshot) -> T) -> PipelineResult<T> {
        let snapshot = read_snapshot(&self.path)?;
        Ok(op(&snapshot))
    }

    fn update<T>(
        &self,
        op: impl FnOnce(&mut StoreSnapshot) -> PipelineResult<T>,
    ) -> PipelineResult<T> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::Store("json store lock poisoned".to_string()))?;
        let mut snapshot = read_snapshot(&self.path)?;
        let value = op(&mut snapshot)?;
        write_snapshot(&self.path, &snapshot)?;
        Ok(value)
    }
}

impl DataStore for JsonFileStore {
    fn brand(&self, id: Uuid) -> PipelineResult<Option<BrandRecord>> {
        self.read(|snapshot| snapshot.brand(id))
    }

    fn brand_examples(&self, query: &ExampleQuery) -> PipelineResult<Vec<BrandExample>> {
        self.read(|snapshot| snapshot.brand_examples(query))
    }

    fn active_template_set(
        &self,
        brand_id: Uuid,
        category: Option<&str>,
    ) -> PipelineResult<Option<TemplateSet>> {
        self.read(|snapshot| snapshot.active_template_set(brand_id, category))
    }

    fn activate_template_set(&self, set: TemplateSet) -> PipelineResult<TemplateSet> {
        self.update(|snapshot| Ok(snapshot.activate_template_set(set)))
    }

    fn style_gallery(&self, id: Uuid) -> PipelineResult<Option<StyleGallery>> {
        self.read(|snapshot| snapshot.style_gallery(id))
    }

    fn trend(&self, id: Uuid) -> PipelineResult<Option<Trend>> {
        self.read(|snapshot| snapshot.trend(id))
    }

    fn content(&self, id: Uuid) -> PipelineResult<Option<GeneratedContent>> {
        self.read(|snapshot| snapshot.content(id))
    }

    fn save_content(&self, content: &GeneratedContent) -> PipelineResult<()> {
        self.update(|snapshot| {
            snapshot.save_content(content);
            Ok(())
        })
    }

    fn upsert_slide_image(
        &self,
        content_id: Uuid,
        slide_index: usize,
        url: &str,
    ) -> PipelineResult<GeneratedContent> {
        self.update(|snapshot| snapshot.upsert_slide_image(content_id, slide_index, url))
    }
}

/// A missing file is an empty store; an unreadable one is an error.
fn read_snapshot(path: &Path) -> PipelineResult<StoreSnapshot> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(StoreSnapshot::default())
        }
        Err(err) => {
            return Err(PipelineError::Store(format!(
                "failed to read {}: {err}",
                path.display()
            )))
        }
    };
    if raw.trim().is_empty() {
        return Ok(StoreSnapshot::default());
    }
    serde_json::from_str(&raw)
        .map_err(|err| PipelineError::Store(format!("invalid store {}: {err}", path.display())))
}

fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> PipelineResult<()> {
    let io_error =
        |err: std::io::Error| PipelineError::Store(format!("failed to write {}: {err}", path.display()));
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(io_error)?;
    let body = serde_json::to_vec_pretty(snapshot)
        .map_err(|err| PipelineError::Store(format!("failed to encode store: {err}")))?;
    // Sibling temp file so the rename stays on one filesystem.
    let mut staged = NamedTempFile::new_in(parent).map_err(io_error)?;
    staged.write_all(&body).map_err(io_error)?;
    staged.as_file().sync_all().map_err(io_error)?;
    staged.persist(path).map_err(|err| io_error(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use trendcast_contracts::content::{
        ContentFormat, ContentStatus, GeneratedContent, Slide, SlideRole, VisualMode,
    };
    use trendcast_contracts::templates::TemplateSet;
    use uuid::Uuid;

    use super::JsonFileStore;
    use crate::store::DataStore;

    #[test]
    fn missing_file_reads_as_empty_store() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonFileStore::new(temp.path().join("store.json"));
        assert!(store.content(Uuid::new_v4())?.is_none());
        assert!(store.load()?.contents.is_empty());
        Ok(())
    }

    #[test]
    fn writes_are_visible_between_instances() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("store.json");
        let store_a = JsonFileStore::new(&path);
        let store_b = JsonFileStore::new(&path);

        let mut content = GeneratedContent::draft(ContentFormat::Post, VisualMode::Free);
        content.slides = vec![Slide::text(SlideRole::Cover, "Headline", "Body")];
        store_a.save_content(&content)?;

        let mut fetched = store_b.content(content.id)?.unwrap_or_else(|| panic!("missing"));
        fetched.approve()?;
        store_b.save_content(&fetched)?;
        store_b.activate_template_set(TemplateSet::new(Uuid::new_v4(), None))?;

        let reloaded = store_a.content(content.id)?.unwrap_or_else(|| panic!("missing"));
        assert_eq!(reloaded.status, ContentStatus::Approved);
        assert_eq!(store_a.load()?.template_sets.len(), 1);
        assert_eq!(store_a.load()?.contents.len(), 1);
        Ok(())
    }

    #[test]
    fn saving_replaces_the_file_without_leftovers() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("store.json");
        let store = JsonFileStore::new(&path);
        let content = GeneratedContent::draft(ContentFormat::Post, VisualMode::Free);
        store.save_content(&content)?;
        store.save_content(&content)?;

        let entries: Vec<_> = std::fs::read_dir(temp.path().join("nested"))?
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(entries.len(), 1);
        let raw = std::fs::read_to_string(&path)?;
        let parsed: serde_json::Value = serde_json::from_str(&raw)?;
        assert!(parsed.is_object());
        assert!(JsonFileStore::new(&path).content(content.id)?.is_some());
        Ok(())
    }

    #[test]
    fn corrupt_file_is_a_store_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("store.json");
        std::fs::write(&path, "{ not json")?;
        let store = JsonFileStore::new(&path);
        assert!(store.content(Uuid::new_v4()).is_err());
        Ok(())
    }
}

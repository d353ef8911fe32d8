//! Persistence of resolved media.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::resolver::MediaCategory;

#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Store `bytes` under `filename` in the folder for `category` and return
    /// the path actually written.
    async fn write(&self, category: MediaCategory, filename: &str, bytes: &[u8]) -> io::Result<PathBuf>;
}

/// Output directory tree: `images/`, `videos/` and `data/` under one root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    pub root: PathBuf,
    pub images: PathBuf,
    pub videos: PathBuf,
    pub data: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            images: root.join("images"),
            videos: root.join("videos"),
            data: root.join("data"),
            root,
        }
    }

    /// Create every folder of the layout.
    pub async fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let layout = Self::new(root);
        for dir in [&layout.images, &layout.videos, &layout.data] {
            tokio::fs::create_dir_all(dir).await?;
        }
        debug!(root = %layout.root.display(), "Output directories ready");
        Ok(layout)
    }

    pub fn dir_for(&self, category: MediaCategory) -> &Path {
        match category {
            MediaCategory::Image => &self.images,
            MediaCategory::Video => &self.videos,
        }
    }
}

/// Pick a name not yet in `taken`: `a.jpg`, then `a_1.jpg`, `a_2.jpg`...
fn unique_name(taken: &mut HashSet<String>, filename: &str) -> String {
    if taken.insert(filename.to_owned()) {
        return filename.to_owned();
    }
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    let mut n = 1usize;
    loop {
        let name = match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        if taken.insert(name.clone()) {
            return name;
        }
        n += 1;
    }
}

/// Writes files beneath an [`OutputLayout`]. Names are de-duplicated for the
/// lifetime of the sink so one run never overwrites its own output.
#[derive(Debug)]
pub struct FsSink {
    layout: OutputLayout,
    taken: Mutex<HashMap<MediaCategory, HashSet<String>>>,
}

impl FsSink {
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            layout,
            taken: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl MediaSink for FsSink {
    async fn write(&self, category: MediaCategory, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = unique_name(self.taken.lock().entry(category).or_default(), filename);
        let dir = self.layout.dir_for(category);
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&name);
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "Saved");
        Ok(path)
    }
}

/// Keeps written files in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: Mutex<Vec<(PathBuf, Bytes)>>,
    taken: Mutex<HashMap<MediaCategory, HashSet<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far, in write order.
    pub fn files(&self) -> Vec<(PathBuf, Bytes)> {
        self.files.lock().clone()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        let path = path.as_ref();
        self.files
            .lock()
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
    }
}

#[async_trait]
impl MediaSink for MemorySink {
    async fn write(&self, category: MediaCategory, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = unique_name(self.taken.lock().entry(category).or_default(), filename);
        let path = Path::new(category.dir_name()).join(name);
        self.files
            .lock()
            .push((path.clone(), Bytes::copy_from_slice(bytes)));
        Ok(path)
    }
}

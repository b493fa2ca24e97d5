use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MODEL_EXTENSION: &str = ".onnx";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
    pub emoji: Option<String>,
}

impl ModelEntry {
    fn new(dir: &Path, file_name: &str, emoji: Option<String>) -> Self {
        Self {
            name: display_name(file_name),
            path: dir.join(file_name),
            emoji,
        }
    }

    /// File name as listed in the models directory.
    pub fn file_name(&self) -> String {
        file_label(&self.path)
    }

    pub fn title(&self) -> String {
        match &self.emoji {
            Some(emoji) => format!("{emoji} {}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse labels file {}: {source}", path.display())]
    Labels {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Last path component, or the whole path when it has none.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `green_lizard.onnx` -> `green lizard`.
pub fn display_name(file_name: &str) -> String {
    file_name.replacen(MODEL_EXTENSION, "", 1).replace('_', " ")
}

pub fn ensure_models_dir(dir: &Path) -> Result<(), CatalogError> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    tracing::info!(dir = %dir.display(), "created models directory");
    Ok(())
}

/// Lists the models in `dir`. When `labels` names an existing JSON file
/// (file name -> emoji), its entries and order win over a directory scan.
pub fn discover(dir: &Path, labels: Option<&Path>) -> Result<Vec<ModelEntry>, CatalogError> {
    let entries = match labels.filter(|path| path.is_file()) {
        Some(labels) => from_labels(dir, labels)?,
        None => scan(dir)?,
    };
    if entries.is_empty() {
        tracing::info!(dir = %dir.display(), "no .onnx models found in models directory");
    }
    Ok(entries)
}

fn scan(dir: &Path) -> Result<Vec<ModelEntry>, CatalogError> {
    let io_err = |source| CatalogError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(MODEL_EXTENSION) && entry.path().is_file() {
            files.push(name);
        }
    }
    files.sort();

    Ok(files
        .iter()
        .map(|name| ModelEntry::new(dir, name, None))
        .collect())
}

fn from_labels(dir: &Path, labels: &Path) -> Result<Vec<ModelEntry>, CatalogError> {
    let raw = fs::read_to_string(labels).map_err(|source| CatalogError::Io {
        path: labels.to_path_buf(),
        source,
    })?;
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&raw).map_err(|source| CatalogError::Labels {
            path: labels.to_path_buf(),
            source,
        })?;

    let mut entries = Vec::with_capacity(map.len());
    for (file, emoji) in map {
        let entry = ModelEntry::new(dir, &file, emoji.as_str().map(str::to_owned));
        if !entry.path.is_file() {
            tracing::warn!(path = %entry.path.display(), "labelled model is missing, skipping");
            continue;
        }
        entries.push(entry);
    }
    Ok(entries)
}

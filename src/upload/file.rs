use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::error::BridgeError;

/// A file received with a request, still sitting in its temporary location
/// until [`UploadedFile::move_to`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    temp_path: PathBuf,
    client_name: String,
    client_mime: String,
    size: u64,
    dimensions: Option<(u32, u32)>,
    name: String,
    moved: bool,
}

impl UploadedFile {
    /// `size` is in bytes.
    #[must_use]
    pub fn new(
        temp_path: impl Into<PathBuf>,
        client_name: &str,
        client_mime: &str,
        size: u64,
    ) -> Self {
        Self {
            temp_path: temp_path.into(),
            client_name: client_name.to_owned(),
            client_mime: client_mime.to_owned(),
            size,
            dimensions: None,
            name: client_name.to_owned(),
            moved: false,
        }
    }

    /// Image width and height, when the request layer knows them.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    #[must_use]
    pub fn client_mime_type(&self) -> &str {
        &self.client_mime
    }

    /// Lower-cased extension of the client name, without the dot.
    #[must_use]
    pub fn client_extension(&self) -> String {
        Path::new(&self.client_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Current file name: the client name, or the stored name after a move.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the file currently lives.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.temp_path
    }

    #[must_use]
    pub fn has_moved(&self) -> bool {
        self.moved
    }

    /// The temporary file still exists and has not been moved yet.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.moved && self.temp_path.is_file()
    }

    /// `<unix time>_<20 hex chars>.<ext>`.
    #[must_use]
    pub fn random_name(&self) -> String {
        let bytes: [u8; 10] = rand::random();
        let mut name = chrono::Utc::now().timestamp().to_string();
        name.push('_');
        for byte in bytes {
            let _ = write!(name, "{byte:02x}");
        }
        let ext = self.client_extension();
        if !ext.is_empty() {
            name.push('.');
            name.push_str(&ext);
        }
        name
    }

    /// Move into `dir` (created if missing) under `name`, or the client name.
    /// An existing file is never overwritten: `_1`, `_2`, ... is appended to the stem.
    ///
    /// # Errors
    /// `Io` when the directory cannot be created or the file cannot be moved;
    /// `ExecutionError` when the file was already moved.
    pub async fn move_to(&mut self, dir: &Path, name: Option<String>) -> Result<PathBuf, BridgeError> {
        if self.moved {
            return Err(BridgeError::ExecutionError(format!(
                "{} has already been moved",
                self.client_name
            )));
        }
        tokio::fs::create_dir_all(dir).await?;
        let target = unique_destination(dir, &name.unwrap_or_else(|| self.client_name.clone()));
        if tokio::fs::rename(&self.temp_path, &target).await.is_err() {
            // rename fails across filesystems
            tokio::fs::copy(&self.temp_path, &target).await?;
            tokio::fs::remove_file(&self.temp_path).await?;
        }
        self.name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.temp_path.clone_from(&target);
        self.moved = true;
        Ok(target)
    }
}

fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{stem}_{n}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Source of uploaded files for a request.
pub trait UploadRequest {
    fn file(&self, field: &str) -> Option<&UploadedFile>;

    /// Take the file out of the request so it can be moved.
    fn take_file(&mut self, field: &str) -> Option<UploadedFile>;
}

/// Files keyed by form field name.
#[derive(Debug, Clone, Default)]
pub struct FileBag {
    files: HashMap<String, UploadedFile>,
}

impl FileBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, field: &str, file: UploadedFile) -> Self {
        self.files.insert(field.to_owned(), file);
        self
    }
}

impl UploadRequest for FileBag {
    fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    fn take_file(&mut self, field: &str) -> Option<UploadedFile> {
        self.files.remove(field)
    }
}

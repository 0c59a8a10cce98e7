//! Image uploads: multipart parsing, type/size policy and the on-disk
//! upload root that `/uploads/...` is served from.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use actix_web::http::header;
use actix_web::web::{self, Bytes, BytesMut};
use actix_web::HttpRequest;
use chrono::Utc;
use futures_util::StreamExt;
use log::{debug, error, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::Serialize;

use crate::errors::ApiError;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Hard cap on the whole multipart body; anything larger cannot hold a
/// compliant file and is refused with the file-size message.
const MAX_BODY_BYTES: usize = 2 * MAX_UPLOAD_BYTES;
const TOO_LARGE: &str = "File size must be less than 5MB";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    files: Vec<UploadedFile>,
    fields: HashMap<String, String>,
}

fn malformed(err: multer::Error) -> ApiError {
    ApiError::BadRequest(format!("Malformed multipart body: {}", err))
}

impl MultipartForm {
    pub async fn read(req: &HttpRequest, mut payload: web::Payload) -> Result<Self, ApiError> {
        let boundary = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|ct| multer::parse_boundary(ct).ok())
            .ok_or_else(|| ApiError::BadRequest("Expected a multipart/form-data body".to_string()))?;

        let mut body = BytesMut::new();
        while let Some(chunk) = payload.next().await {
            let chunk = chunk.map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;
            if body.len() + chunk.len() > MAX_BODY_BYTES {
                return Err(ApiError::BadRequest(TOO_LARGE.to_string()));
            }
            body.extend_from_slice(&chunk);
        }

        Self::parse(body.freeze(), boundary).await
    }

    pub async fn parse(body: Bytes, boundary: String) -> Result<Self, ApiError> {
        let stream = futures_util::stream::once(async move { Ok::<Bytes, io::Error>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_owned();
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .map(|m| m.essence_str().to_ascii_lowercase())
                        .unwrap_or_default();
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.files.push(UploadedFile {
                        field: name,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                None => {
                    let value = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePolicy {
    /// JPEG, PNG and WebP.
    Photo,
    /// Also GIF; used for gallery and event artwork.
    Artwork,
}

impl ImagePolicy {
    fn allowed(&self) -> &'static [&'static str] {
        match self {
            ImagePolicy::Photo => &["image/jpeg", "image/jpg", "image/png", "image/webp"],
            ImagePolicy::Artwork => &["image/jpeg", "image/jpg", "image/png", "image/webp", "image/gif"],
        }
    }

    fn type_error(&self) -> &'static str {
        match self {
            ImagePolicy::Photo => "Invalid file type. Only JPEG, PNG, and WebP are allowed.",
            ImagePolicy::Artwork => "Invalid file type. Only JPEG, PNG, WebP, and GIF are allowed.",
        }
    }

    /// Presence, then type, then size, then emptiness.
    pub fn check<'a>(&self, file: Option<&'a UploadedFile>) -> Result<&'a UploadedFile, ApiError> {
        let file = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
        if !self.allowed().contains(&file.content_type.as_str()) {
            return Err(ApiError::BadRequest(self.type_error().to_string()));
        }
        if file.len() > MAX_UPLOAD_BYTES {
            return Err(ApiError::BadRequest(TOO_LARGE.to_string()));
        }
        if file.is_empty() {
            return Err(ApiError::BadRequest("File is empty".to_string()));
        }
        Ok(file)
    }
}

/// `<unix millis>-<8 lowercase alphanumerics>.<lower-cased extension>`.
pub fn generate_file_name(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());

    let suffix: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{}-{}.{}", Utc::now().timestamp_millis(), suffix, ext)
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Ok,
    Empty,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub state: FileState,
    pub size: u64,
}

impl FileStatus {
    pub fn is_broken(&self) -> bool {
        self.state != FileState::Ok
    }
}

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a path relative to the upload root onto disk. Anything that could
    /// step outside the root is refused.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let rel = Path::new(relative);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(rel))
    }

    /// Maps a public `/uploads/...` URL onto disk.
    pub fn resolve_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        self.resolve(relative)
    }

    pub async fn save(&self, subdir: Option<&str>, original_name: &str, bytes: &[u8]) -> Result<StoredFile, ApiError> {
        let file_name = generate_file_name(original_name);
        let (dir, url) = match subdir {
            Some(sub) => (self.root.join(sub), format!("{}/{}/{}", PUBLIC_PREFIX, sub, file_name)),
            None => (self.root.clone(), format!("{}/{}", PUBLIC_PREFIX, file_name)),
        };

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            error!("Failed to create upload directory {}: {}", dir.display(), e);
            ApiError::InternalError(format!("Upload directory error: {}", e))
        })?;

        let path = dir.join(&file_name);
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            error!("Failed to write upload {}: {}", path.display(), e);
            ApiError::InternalError(format!("Upload write error: {}", e))
        })?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(StoredFile { path, url })
    }

    /// Compensating delete for a file whose database row never made it.
    pub async fn discard(&self, stored: &StoredFile) {
        if let Err(e) = tokio::fs::remove_file(&stored.path).await {
            warn!("Could not remove orphaned upload {}: {}", stored.path.display(), e);
        }
    }

    /// Classifies the file behind a public URL. URLs outside the upload root
    /// count as missing.
    pub async fn inspect(&self, url: &str) -> FileStatus {
        let missing = FileStatus {
            state: FileState::Missing,
            size: 0,
        };
        let Some(path) = self.resolve_url(url) else {
            return missing;
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => FileStatus {
                state: FileState::Ok,
                size: meta.len(),
            },
            Ok(meta) if meta.is_file() => FileStatus {
                state: FileState::Empty,
                size: 0,
            },
            _ => missing,
        }
    }

    pub async fn read(&self, relative: &str) -> io::Result<(Vec<u8>, &'static str)> {
        let path = self
            .resolve(relative)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "path escapes upload root"))?;
        let bytes = tokio::fs::read(&path).await?;
        Ok((bytes, content_type_for(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str, len: usize) -> UploadedFile {
        UploadedFile {
            field: "file".into(),
            file_name: "photo.JPG".into(),
            content_type: content_type.into(),
            bytes: Bytes::from(vec![7u8; len]),
        }
    }

    #[test]
    fn policy_rejects_wrong_types_regardless_of_size() {
        let pdf = file("application/pdf", 10);
        assert!(ImagePolicy::Photo.check(Some(&pdf)).is_err());
        let huge_pdf = file("application/pdf", MAX_UPLOAD_BYTES + 1);
        let err = ImagePolicy::Photo.check(Some(&huge_pdf)).unwrap_err();
        assert!(err.to_string().contains("Invalid file type"));
    }

    #[test]
    fn policy_enforces_size_and_emptiness() {
        let big = file("image/png", 6 * 1024 * 1024);
        assert!(ImagePolicy::Photo.check(Some(&big)).unwrap_err().to_string().contains("5MB"));
        let empty = file("image/png", 0);
        assert!(ImagePolicy::Photo.check(Some(&empty)).unwrap_err().to_string().contains("empty"));
        let exact = file("image/png", MAX_UPLOAD_BYTES);
        assert!(ImagePolicy::Photo.check(Some(&exact)).is_ok());
        assert!(ImagePolicy::Photo.check(None).is_err());
    }

    #[test]
    fn gif_is_artwork_only() {
        let gif = file("image/gif", 12);
        assert!(ImagePolicy::Photo.check(Some(&gif)).is_err());
        assert!(ImagePolicy::Artwork.check(Some(&gif)).is_ok());
    }

    #[test]
    fn generated_names_keep_a_lowercase_extension() {
        let name = generate_file_name("Meetup Photo.PNG");
        let (stem, ext) = name.rsplit_once('.').unwrap();
        assert_eq!(ext, "png");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

        assert!(generate_file_name("no-extension").ends_with(".jpg"));
    }

    #[test]
    fn traversal_is_refused() {
        let dir = UploadDir::new("/srv/uploads");
        assert!(dir.resolve("../etc/passwd").is_none());
        assert!(dir.resolve("events/../../secret").is_none());
        assert!(dir.resolve("").is_none());
        assert_eq!(dir.resolve("events/a.png"), Some(PathBuf::from("/srv/uploads/events/a.png")));
        assert!(dir.resolve_url("/static/a.png").is_none());
    }

    #[test]
    fn content_types_follow_the_extension_table() {
        assert_eq!(content_type_for(Path::new("a.JPEG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("a.svg")), "image/svg+xml");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
    }

    #[tokio::test]
    async fn saved_files_can_be_inspected_and_discarded() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::new(tmp.path());

        let stored = dir.save(Some("events"), "banner.webp", b"RIFF").await.unwrap();
        assert!(stored.url.starts_with("/uploads/events/"));
        assert!(stored.url.ends_with(".webp"));
        assert_eq!(
            dir.inspect(&stored.url).await,
            FileStatus {
                state: FileState::Ok,
                size: 4
            }
        );

        dir.discard(&stored).await;
        assert_eq!(dir.inspect(&stored.url).await.state, FileState::Missing);
    }

    #[tokio::test]
    async fn empty_and_foreign_files_are_broken() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = UploadDir::new(tmp.path());
        tokio::fs::write(tmp.path().join("zero.png"), b"").await.unwrap();

        assert_eq!(dir.inspect("/uploads/zero.png").await.state, FileState::Empty);
        assert!(dir.inspect("https://cdn.example.com/a.png").await.is_broken());
    }

    #[tokio::test]
    async fn multipart_bodies_split_into_files_and_fields() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "Night drive\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"night.png\"\r\n",
            "Content-Type: image/png\r\n\r\n",
            "PNGDATA\r\n",
            "--XBOUNDARY--\r\n",
        );
        let form = MultipartForm::parse(Bytes::from(body), "XBOUNDARY".into()).await.unwrap();

        assert_eq!(form.text("title"), Some("Night drive"));
        let file = form.file("file").unwrap();
        assert_eq!(file.file_name, "night.png");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(&file.bytes[..], b"PNGDATA");
    }
}

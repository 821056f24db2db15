//! Style model resolution, downloading and loading.

use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indicatif::{ProgressBar, ProgressStyle};
use ort::session::Session;

use crate::error::{Error, Result};

/// Style models shipped with the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleModel {
    Picasso,
    VanGogh,
    GeorgesSeurat,
    Cyberpunk,
}

impl StyleModel {
    /// Every known style, in menu order.
    pub const ALL: [Self; 4] = [
        Self::Picasso,
        Self::VanGogh,
        Self::GeorgesSeurat,
        Self::Cyberpunk,
    ];

    /// Get the filename for this style's model.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Picasso => "picasso.onnx",
            Self::VanGogh => "vangogh.onnx",
            Self::GeorgesSeurat => "georgesseurat.onnx",
            Self::Cyberpunk => "cyberpunk.onnx",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Picasso => "Picasso",
            Self::VanGogh => "Van Gogh",
            Self::GeorgesSeurat => "Georges Seurat",
            Self::Cyberpunk => "Cyberpunk",
        }
    }
}

impl fmt::Display for StyleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for StyleModel {
    type Err = Error;

    /// Accepts display names and their dash/underscore/space-free spellings,
    /// case-insensitively (`"Van Gogh"`, `"van-gogh"`, `"vangogh"`).
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();

        Self::ALL
            .into_iter()
            .find(|style| style.filename().trim_end_matches(".onnx") == wanted)
            .ok_or_else(|| Error::InvalidParameter {
                name: "style".to_string(),
                reason: format!(
                    "unknown style {s:?}, expected one of: {}",
                    Self::ALL.map(|style| style.display_name()).join(", ")
                ),
            })
    }
}

/// Manages the model directory and downloads.
pub struct ModelCache {
    cache_dir: PathBuf,
    base_url: Option<String>,
}

impl ModelCache {
    /// Create a new model cache.
    ///
    /// Without an explicit directory the platform-appropriate cache directory
    /// is used:
    /// - Windows: `%LOCALAPPDATA%\restyle\models`
    /// - Linux: `~/.cache/restyle/models`
    /// - macOS: `~/Library/Caches/restyle/models`
    ///
    /// Missing models are fetched from `{base_url}/{filename}` when a base
    /// URL is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new(cache_dir: Option<PathBuf>, base_url: Option<String>) -> Result<Self> {
        let cache_dir = cache_dir.unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("restyle")
                .join("models")
        });

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self {
            cache_dir,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// Directory holding the model files.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a style model, downloading it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelNotFound`] if the model is not cached and no base
    /// URL is configured, or a download error.
    pub fn model_path(&self, style: StyleModel) -> Result<PathBuf> {
        let path = self.cache_dir.join(style.filename());
        if path.exists() {
            return Ok(path);
        }

        let Some(base_url) = &self.base_url else {
            return Err(Error::ModelNotFound {
                name: style.display_name().to_string(),
                path,
            });
        };

        let url = format!("{base_url}/{}", style.filename());
        download_file(&url, &path, style.filename())?;

        Ok(path)
    }
}

/// Load an ONNX model session from `path`.
///
/// # Errors
///
/// Returns [`Error::ModelNotFound`] for a missing file or
/// [`Error::ModelLoad`] if the model cannot be loaded.
pub fn load_session(path: &Path) -> Result<Session> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    if !path.exists() {
        return Err(Error::ModelNotFound {
            name,
            path: path.to_path_buf(),
        });
    }

    tracing::info!("Loading model {name}...");
    Session::builder()
        .map_err(|source| Error::ModelLoad {
            name: name.clone(),
            source,
        })?
        .commit_from_file(path)
        .map_err(|source| Error::ModelLoad { name, source })
}

/// Download a file from a URL to a path with progress indication.
fn download_file(url: &str, path: &Path, name: &str) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    let pb = response
        .content_length()
        .map_or_else(ProgressBar::new_spinner, ProgressBar::new);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("Downloading {name}"));

    persist_stream(response, path, &pb)?;
    pb.finish_with_message(format!("Downloaded {name}"));

    Ok(())
}

/// Stream `reader` into `path` through a sibling `.tmp` file.
///
/// `path` only appears once the whole stream has been written. On failure the
/// partial temporary file is removed.
fn persist_stream<R: Read>(reader: R, path: &Path, pb: &ProgressBar) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let written = write_stream(reader, &temp_path, pb)
        .and_then(|()| fs::rename(&temp_path, path).map_err(Error::from));
    if written.is_err() && temp_path.exists() {
        if let Err(err) = fs::remove_file(&temp_path) {
            tracing::warn!("failed to remove partial download {}: {err}", temp_path.display());
        }
    }

    written
}

fn write_stream<R: Read>(mut reader: R, temp_path: &Path, pb: &ProgressBar) -> Result<()> {
    let mut file = fs::File::create(temp_path)?;
    let mut downloaded = 0u64;

    loop {
        let mut buffer = [0u8; 8192];
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }
    file.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_filenames() {
        assert_eq!(StyleModel::VanGogh.filename(), "vangogh.onnx");
        assert_eq!(StyleModel::GeorgesSeurat.filename(), "georgesseurat.onnx");
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("Van Gogh".parse::<StyleModel>().unwrap(), StyleModel::VanGogh);
        assert_eq!("van-gogh".parse::<StyleModel>().unwrap(), StyleModel::VanGogh);
        assert_eq!("CYBERPUNK".parse::<StyleModel>().unwrap(), StyleModel::Cyberpunk);
        assert_eq!(
            "georges_seurat".parse::<StyleModel>().unwrap(),
            StyleModel::GeorgesSeurat
        );
        for style in StyleModel::ALL {
            assert_eq!(style.to_string().parse::<StyleModel>().unwrap(), style);
        }
        assert!(matches!(
            "Monet".parse::<StyleModel>(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_cache_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let models = dir.path().join("a").join("models");
        let cache = ModelCache::new(Some(models.clone()), None).unwrap();

        assert!(models.is_dir());
        assert_eq!(cache.cache_dir(), models);
    }

    #[test]
    fn test_cached_model_is_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("picasso.onnx"), b"stub").unwrap();
        let cache = ModelCache::new(Some(dir.path().to_path_buf()), None).unwrap();

        assert_eq!(
            cache.model_path(StyleModel::Picasso).unwrap(),
            dir.path().join("picasso.onnx")
        );
    }

    #[test]
    fn test_missing_model_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(Some(dir.path().to_path_buf()), None).unwrap();

        match cache.model_path(StyleModel::Cyberpunk) {
            Err(Error::ModelNotFound { name, path }) => {
                assert_eq!(name, "Cyberpunk");
                assert_eq!(path, dir.path().join("cyberpunk.onnx"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::new(
            Some(dir.path().to_path_buf()),
            Some("https://models.example/styles/".to_string()),
        )
        .unwrap();

        assert_eq!(cache.base_url.as_deref(), Some("https://models.example/styles"));
    }

    /// Yields `good` bytes, then fails.
    struct BrokenStream {
        good: usize,
    }

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.good == 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                ));
            }
            let n = self.good.min(buf.len());
            buf[..n].fill(0xAB);
            self.good -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_interrupted_download_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vangogh.onnx");

        let result = persist_stream(BrokenStream { good: 20_000 }, &path, &ProgressBar::hidden());

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(!path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_completed_download_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("picasso.onnx");
        let body = vec![7u8; 20_000];

        persist_stream(body.as_slice(), &path, &ProgressBar::hidden()).unwrap();

        assert_eq!(fs::read(&path).unwrap(), body);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_session_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.onnx");

        assert!(matches!(
            load_session(&path),
            Err(Error::ModelNotFound { .. })
        ));
    }
}

//! Cached asset uploads.
//!
//! Every legacy asset URL maps to exactly one CMS asset: the first
//! encounter downloads, re-encodes (images) and uploads, then records
//! the asset ID in a JSON cache file. Later encounters, in the same run
//! or any later run, return the cached ID with zero network activity.
//! The cache is append-only and never invalidated automatically.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::imageops::FilterType;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use audiofast_client::SanityClient;

use crate::error::MigrateError;
use crate::html::shortcodes::ImageShortcode;
use crate::html::ImageResolver;

/// Images narrower than this are upscaled 2x before upload; wider ones
/// are fitted into [`MAX_BOX`].
const UPSCALE_THRESHOLD: u32 = 1400;
const MAX_BOX: (u32, u32) = (2400, 2400);
const JPEG_QUALITY: u8 = 82;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSizes {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedAsset {
    pub asset_id: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<ImageSizes>,
}

/// `source URL → asset` map persisted to disk. Loaded once per run,
/// saved explicitly; concurrent runs sharing one file must be
/// serialized by the operator (no file locking).
#[derive(Debug)]
pub struct AssetCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, CachedAsset>>,
}

impl AssetCache {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, source_url: &str) -> Option<CachedAsset> {
        self.entries.lock().unwrap().get(source_url).cloned()
    }

    pub fn insert(&self, source_url: String, asset: CachedAsset) {
        self.entries.lock().unwrap().insert(source_url, asset);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn save(&self) -> Result<(), MigrateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries = self.entries.lock().unwrap();
        std::fs::write(&self.path, serde_json::to_string_pretty(&*entries)?)?;
        Ok(())
    }
}

/// Downloads bytes from the legacy host.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MigrateError>;
}

/// Production fetcher. The legacy host serves a stale certificate
/// chain, so verification is disabled for downloads only; redirects are
/// followed.
pub struct LegacyHostFetcher {
    http: reqwest::Client,
}

impl LegacyHostFetcher {
    pub fn new() -> Result<Self, MigrateError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl RemoteFetcher for LegacyHostFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MigrateError> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Destination for uploaded bytes. Abstracted so tests can count
/// uploads without a network.
#[async_trait]
pub trait AssetSink: Send + Sync {
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, MigrateError>;

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, MigrateError>;
}

#[async_trait]
impl AssetSink for SanityClient {
    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, MigrateError> {
        Ok(SanityClient::upload_image(self, bytes, filename, content_type).await?)
    }

    async fn upload_file(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> Result<String, MigrateError> {
        Ok(SanityClient::upload_file(self, bytes, filename, content_type).await?)
    }
}

/// `upload(sourceUrl) → assetId` with the cache in front.
pub struct AssetUploader {
    sink: Option<Arc<dyn AssetSink>>,
    fetcher: Arc<dyn RemoteFetcher>,
    cache: Arc<AssetCache>,
    base_url: String,
    dry_run: bool,
    uploads: AtomicUsize,
}

impl AssetUploader {
    pub fn new(
        sink: Option<Arc<dyn AssetSink>>,
        fetcher: Arc<dyn RemoteFetcher>,
        cache: Arc<AssetCache>,
        base_url: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            sink,
            fetcher,
            cache,
            base_url: base_url.into(),
            dry_run,
            uploads: AtomicUsize::new(0),
        }
    }

    /// Uploads performed by this run (cache hits excluded).
    pub fn upload_count(&self) -> usize {
        self.uploads.load(AtomicOrdering::SeqCst)
    }

    pub async fn upload_image(&self, source: &str) -> Result<String, MigrateError> {
        self.upload(source, true).await
    }

    pub async fn upload_file(&self, source: &str) -> Result<String, MigrateError> {
        self.upload(source, false).await
    }

    async fn upload(&self, source: &str, is_image: bool) -> Result<String, MigrateError> {
        let url = self.absolute_url(source);
        if let Some(hit) = self.cache.get(&url) {
            return Ok(hit.asset_id);
        }

        let filename = filename_of(&url);
        if self.dry_run {
            let asset_id = placeholder_asset_id(&filename);
            self.cache.insert(
                url,
                CachedAsset {
                    asset_id: asset_id.clone(),
                    uploaded_at: Utc::now(),
                    sizes: None,
                },
            );
            return Ok(asset_id);
        }

        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| MigrateError::WritesDisabled("no write token for asset upload".into()))?;

        let bytes = self.fetcher.fetch(&url).await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "downloaded legacy asset");

        let (asset_id, sizes) = if is_image {
            let (encoded, sizes) = reencode_image(&bytes)?;
            let jpeg_name = format!("{}.jpg", filename.rsplit_once('.').map_or(filename.as_str(), |(stem, _)| stem));
            let id = sink.upload_image(encoded, &jpeg_name, "image/jpeg").await?;
            (id, Some(sizes))
        } else {
            let content_type = content_type_of(&filename);
            let id = sink.upload_file(bytes, &filename, content_type).await?;
            (id, None)
        };

        self.uploads.fetch_add(1, AtomicOrdering::SeqCst);
        self.cache.insert(
            url,
            CachedAsset {
                asset_id: asset_id.clone(),
                uploaded_at: Utc::now(),
                sizes,
            },
        );
        Ok(asset_id)
    }

    fn absolute_url(&self, source: &str) -> String {
        if source.starts_with("http://") || source.starts_with("https://") {
            source.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                source.trim_start_matches('/')
            )
        }
    }
}

#[async_trait]
impl ImageResolver for AssetUploader {
    async fn resolve_image(&self, shortcode: &ImageShortcode) -> Result<String, MigrateError> {
        self.upload_image(&shortcode.src).await
    }
}

/// Resize rule: small originals get a 2x upscale so full-width rendering
/// has pixels to work with; large originals are fitted into a bounded
/// box. Output is always lossy JPEG at a fixed quality.
pub fn reencode_image(bytes: &[u8]) -> Result<(Vec<u8>, ImageSizes), MigrateError> {
    let img = image::load_from_memory(bytes)?;
    let (width, height) = img.dimensions();

    let resized = if width < UPSCALE_THRESHOLD {
        img.resize(width * 2, height * 2, FilterType::Lanczos3)
    } else if width > MAX_BOX.0 || height > MAX_BOX.1 {
        img.resize(MAX_BOX.0, MAX_BOX.1, FilterType::Lanczos3)
    } else {
        img
    };
    let sizes = ImageSizes {
        width: resized.width(),
        height: resized.height(),
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut out), JPEG_QUALITY);
    encoder.encode_image(&rgb)?;
    Ok((out, sizes))
}

/// Deterministic synthetic asset ID for dry runs, derived from the
/// filename so repeated dry runs produce identical documents.
pub fn placeholder_asset_id(filename: &str) -> String {
    let digest = Sha256::digest(filename.as_bytes());
    let hex: String = digest[..6].iter().map(|b| format!("{b:02x}")).collect();
    format!("image-{hex}-dryrun")
}

pub fn filename_of(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or(url)
        .split('?')
        .next()
        .unwrap_or(url)
        .to_string()
}

pub fn content_type_of(filename: &str) -> &'static str {
    match filename.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 30, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    struct CountingFetcher {
        calls: AtomicUsize,
        payload: Vec<u8>,
    }

    #[async_trait]
    impl RemoteFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, MigrateError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    struct CountingSink {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssetSink for CountingSink {
        async fn upload_image(
            &self,
            _bytes: Vec<u8>,
            filename: &str,
            _content_type: &str,
        ) -> Result<String, MigrateError> {
            let n = self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(format!("image-{filename}-{n}"))
        }

        async fn upload_file(
            &self,
            _bytes: Vec<u8>,
            filename: &str,
            _content_type: &str,
        ) -> Result<String, MigrateError> {
            let n = self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(format!("file-{filename}-{n}"))
        }
    }

    fn uploader(
        cache: Arc<AssetCache>,
        dry_run: bool,
    ) -> (Arc<CountingFetcher>, Arc<CountingSink>, AssetUploader) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            payload: png_bytes(100, 60),
        });
        let sink = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
        });
        let up = AssetUploader::new(
            Some(sink.clone()),
            fetcher.clone(),
            cache,
            "https://legacy.audiofast.pl",
            dry_run,
        );
        (fetcher, sink, up)
    }

    #[tokio::test]
    async fn repeated_upload_hits_cache_with_zero_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("asset-cache.json");
        let cache = Arc::new(AssetCache::load(&cache_path));

        let (fetcher, sink, up) = uploader(cache.clone(), false);
        let first = up.upload_image("assets/Uploads/gato.png").await.unwrap();
        let second = up.upload_image("assets/Uploads/gato.png").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(sink.calls.load(AtomicOrdering::SeqCst), 1);
        cache.save().unwrap();

        // A fresh run reloading the cache performs no network activity.
        let reloaded = Arc::new(AssetCache::load(&cache_path));
        let (fetcher2, sink2, up2) = uploader(reloaded, false);
        let third = up2.upload_image("assets/Uploads/gato.png").await.unwrap();
        assert_eq!(third, first);
        assert_eq!(fetcher2.calls.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(sink2.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dry_run_is_deterministic_and_offline() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(AssetCache::load(dir.path().join("cache.json")));
        let (fetcher, sink, up) = uploader(cache, true);

        let a = up.upload_image("assets/x.png").await.unwrap();
        assert_eq!(a, placeholder_asset_id("x.png"));
        assert!(a.ends_with("-dryrun"));
        assert_eq!(fetcher.calls.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(sink.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn small_images_upscale_and_large_images_fit_the_box() {
        let (_, small) = reencode_image(&png_bytes(100, 60)).unwrap();
        assert_eq!((small.width, small.height), (200, 120));

        let (_, large) = reencode_image(&png_bytes(3000, 1500)).unwrap();
        assert!(large.width <= MAX_BOX.0 && large.height <= MAX_BOX.1);
        assert_eq!(large.width, 2400);
    }

    #[test]
    fn placeholder_ids_are_stable_per_filename() {
        assert_eq!(placeholder_asset_id("a.png"), placeholder_asset_id("a.png"));
        assert_ne!(placeholder_asset_id("a.png"), placeholder_asset_id("b.png"));
    }

    #[test]
    fn filename_and_content_type_helpers() {
        assert_eq!(filename_of("https://x/a/b/c.pdf?v=2"), "c.pdf");
        assert_eq!(content_type_of("c.pdf"), "application/pdf");
        assert_eq!(content_type_of("photo.JPG"), "image/jpeg");
    }
}

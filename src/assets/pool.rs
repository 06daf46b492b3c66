use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use rayon::prelude::*;

use crate::foundation::core::ImageId;
use crate::foundation::error::{TrailError, TrailResult};

/// Straight-alpha RGBA8 pixels, row-major.
pub type PixelBuffer = image::RgbaImage;

/// Source of decoded pool images.
///
/// Implementations may block; [`ImagePool::load`] calls them from a rayon pool.
pub trait ImageLoader: Sync {
    /// Load and decode the image identified by `source`.
    fn load(&self, source: &str) -> TrailResult<PixelBuffer>;
}

/// Loads images from the filesystem, resolving relative sources against `root`.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    /// Loader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let p = Path::new(source);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, source: &str) -> TrailResult<PixelBuffer> {
        let path = self.resolve(source);
        let bytes =
            std::fs::read(&path).with_context(|| format!("read image '{}'", path.display()))?;
        decode_image(&bytes)
    }
}

/// Decode encoded image bytes (PNG, JPEG, ...) into straight-alpha RGBA8.
pub fn decode_image(bytes: &[u8]) -> TrailResult<PixelBuffer> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| TrailError::image_load(format!("decode image from memory: {e}")))?;
    Ok(dyn_img.to_rgba8())
}

/// One pool entry: identity plus its decoded pixels, or the reason they are missing.
#[derive(Clone, Debug)]
pub struct PoolImage {
    id: ImageId,
    source: String,
    pixels: Result<Arc<PixelBuffer>, String>,
}

impl PoolImage {
    /// Entry with decoded pixels.
    pub fn loaded(id: ImageId, source: impl Into<String>, pixels: PixelBuffer) -> Self {
        Self {
            id,
            source: source.into(),
            pixels: Ok(Arc::new(pixels)),
        }
    }

    /// Entry whose load failed. It still occupies its pool position.
    pub fn failed(id: ImageId, source: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id,
            source: source.into(),
            pixels: Err(reason.into()),
        }
    }

    /// Pool identity.
    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Source path or label the image was loaded from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Decoded pixels, if the load succeeded.
    pub fn pixels(&self) -> Option<&Arc<PixelBuffer>> {
        self.pixels.as_ref().ok()
    }

    /// Load failure reason, if any.
    pub fn load_error(&self) -> Option<&str> {
        self.pixels.as_ref().err().map(String::as_str)
    }

    /// Pixel dimensions, `(0, 0)` when unavailable.
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels().map(|p| p.dimensions()).unwrap_or((0, 0))
    }
}

/// Fixed, ordered set of images the trail cycles through. Immutable after construction.
#[derive(Clone, Debug)]
pub struct ImagePool {
    images: Vec<Arc<PoolImage>>,
}

impl ImagePool {
    /// Load every source with `loader`, in parallel.
    ///
    /// Individual failures do not fail the pool: the entry keeps its position and is excluded from
    /// recoloring. Only an empty source list is an error.
    #[tracing::instrument(skip(sources, loader), fields(count = sources.len()))]
    pub fn load<S>(sources: &[S], loader: &dyn ImageLoader) -> TrailResult<Self>
    where
        S: AsRef<str> + Sync,
    {
        if sources.is_empty() {
            return Err(TrailError::validation("image pool must not be empty"));
        }

        let images = sources
            .par_iter()
            .enumerate()
            .map(|(i, s)| {
                let source = s.as_ref();
                match loader.load(source) {
                    Ok(px) => PoolImage::loaded(ImageId(i), source, px),
                    Err(e) => {
                        tracing::warn!(image = i, source, error = %e, "pool image failed to load");
                        PoolImage::failed(ImageId(i), source, e.to_string())
                    }
                }
            })
            .map(Arc::new)
            .collect::<Vec<_>>();

        Ok(Self { images })
    }

    /// Build a pool from already-decoded images, labelled by index.
    pub fn from_pixels(images: Vec<PixelBuffer>) -> TrailResult<Self> {
        let entries = images
            .into_iter()
            .enumerate()
            .map(|(i, px)| PoolImage::loaded(ImageId(i), format!("memory:{i}"), px))
            .collect();
        Self::from_entries(entries)
    }

    /// Build a pool from prepared entries. Ids must equal positions.
    pub fn from_entries(entries: Vec<PoolImage>) -> TrailResult<Self> {
        if entries.is_empty() {
            return Err(TrailError::validation("image pool must not be empty"));
        }
        if let Some((i, e)) = entries.iter().enumerate().find(|(i, e)| e.id.0 != *i) {
            return Err(TrailError::validation(format!(
                "pool entry at position {i} has mismatched id {}",
                e.id
            )));
        }
        Ok(Self {
            images: entries.into_iter().map(Arc::new).collect(),
        })
    }

    /// Number of images (the ring capacity of the trail).
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Always `false` for a constructed pool.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Entry by id.
    pub fn get(&self, id: ImageId) -> Option<&Arc<PoolImage>> {
        self.images.get(id.0)
    }

    /// Entries in pool order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PoolImage>> {
        self.images.iter()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/pool.rs"]
mod tests;

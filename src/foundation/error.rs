use crate::foundation::core::ImageId;

/// Convenience result alias used across the crate.
pub type TrailResult<T> = Result<T, TrailError>;

/// Top-level error type for configuration, loading, transform and render failures.
#[derive(thiserror::Error, Debug)]
pub enum TrailError {
    /// Invalid user-provided value (configuration, buffer shape, ...).
    #[error("validation error: {0}")]
    Validation(String),

    /// A pool image could not be read or decoded.
    #[error("image load error: {0}")]
    ImageLoad(String),

    /// The pixel pipeline rejected its input.
    #[error("transform error: {0}")]
    Transform(String),

    /// A rendering surface failed to paint a frame.
    #[error("render error: {0}")]
    Render(String),

    /// Wrapped lower-level error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrailError {
    /// Build a [`TrailError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`TrailError::ImageLoad`].
    pub fn image_load(msg: impl Into<String>) -> Self {
        Self::ImageLoad(msg.into())
    }

    /// Build a [`TrailError::Transform`].
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Build a [`TrailError::Render`].
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

/// Outcome shared by every waiter on one recolor cache key.
///
/// Negative results are cached like positive ones, so this type must be cheap to clone.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum RecolorError {
    /// The source image never decoded; it is excluded from recoloring for the session.
    #[error("image {image} is unavailable: {reason}")]
    ResourceLoad {
        /// Pool image the request was made for.
        image: ImageId,
        /// Loader diagnostic.
        reason: String,
    },

    /// The pixel computation failed or panicked.
    #[error("recolor of image {image} failed: {reason}")]
    Transform {
        /// Pool image the request was made for.
        image: ImageId,
        /// Failure diagnostic.
        reason: String,
    },

    /// The executor dropped the job before it produced a result.
    #[error("recolor job was abandoned before completion")]
    Abandoned,
}

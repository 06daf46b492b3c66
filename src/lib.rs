#![forbid(unsafe_code)]

pub mod animation;
pub mod assets;
pub mod foundation;
pub mod recolor;
pub mod render;
pub mod trail;

pub use animation::ease::Ease;
pub use animation::tween::{Channel, Timeline, TweenId, TweenSpec, TweenUpdate};
pub use assets::pool::{FsImageLoader, ImageLoader, ImagePool, PixelBuffer, PoolImage, decode_image};
pub use foundation::core::{Affine, ImageId, Millis, Point, PointerSample, Rect, Rgb8, Size, Vec2};
pub use foundation::error::{RecolorError, TrailError, TrailResult};
pub use recolor::cache::{
    DeferredExecutor, RayonExecutor, RecolorCache, RecolorExecutor, RecolorKey, RecolorOutcome,
    RecolorTicket, RecoloredVisual,
};
pub use recolor::transform::{TransformParams, transform, transform_image};
pub use render::{CpuSurface, FrameRGBA, RenderSettings, RenderSurface, SceneItem};
pub use trail::config::{SizeVariant, TrailConfig};
pub use trail::controller::{TrailController, TrailStats};
pub use trail::pointer::PointerSampler;
pub use trail::slot::{OverlayFilter, SlotState, TrailSlot, pick_variant};

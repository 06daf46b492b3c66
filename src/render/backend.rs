use std::sync::Arc;

use crate::assets::pool::PixelBuffer;
use crate::foundation::core::{Affine, ImageId, Point, Rect, Size};
use crate::foundation::error::{TrailError, TrailResult};
use crate::trail::slot::{OverlayFilter, TrailSlot};

/// One rendered frame.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha image suitable for encoding.
    pub fn to_rgba_image(&self) -> TrailResult<PixelBuffer> {
        let mut data = self.data.clone();
        if self.premultiplied {
            for px in data.chunks_exact_mut(4) {
                let a = u32::from(px[3]);
                if a == 0 || a == 255 {
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
        PixelBuffer::from_raw(self.width, self.height, data)
            .ok_or_else(|| TrailError::render("frame buffer does not match its dimensions"))
    }
}

/// One trail slot as the surface sees it: a base visual with an optional recolored overlay.
#[derive(Clone, Debug)]
pub struct SceneItem {
    pub image: ImageId,
    /// `None` when the pool image failed to load; nothing is drawn for the base.
    pub base: Option<Arc<PixelBuffer>>,
    pub overlay: Option<Arc<PixelBuffer>>,
    pub overlay_opacity: f64,
    pub filter: OverlayFilter,
    pub center: Point,
    pub size: Size,
    pub scale: f64,
    pub rotation_deg: f64,
    pub opacity: f64,
    pub z_order: u32,
}

impl SceneItem {
    pub(crate) fn from_slot(slot: &TrailSlot) -> Self {
        Self {
            image: slot.image_id(),
            base: slot.image().pixels().cloned(),
            overlay: slot.overlay().map(|v| Arc::clone(&v.image)),
            overlay_opacity: slot.recolor_progress(),
            filter: slot.filter(),
            center: slot.center(),
            size: slot.size(),
            scale: slot.scale(),
            rotation_deg: slot.rotation_deg(),
            opacity: slot.opacity(),
            z_order: slot.z_order(),
        }
    }

    /// Maps item-local coordinates (origin at the item center) to surface coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.center.to_vec2())
            * Affine::rotate(self.rotation_deg.to_radians())
            * Affine::scale(self.scale)
    }

    /// Item rectangle in local coordinates.
    pub fn local_rect(&self) -> Rect {
        Rect::from_center_size(Point::ORIGIN, self.size)
    }

    /// Axis-aligned surface bounds of the transformed item.
    pub fn bounds(&self) -> Rect {
        self.transform().transform_rect_bbox(self.local_rect())
    }
}

#[derive(Clone, Debug, Default)]
pub struct RenderSettings {
    pub clear_rgba: Option<[u8; 4]>,
}

/// Paints a scene once per frame.
pub trait RenderSurface {
    /// Items are painted in slice order; callers pass them sorted by z.
    fn render_scene(&mut self, items: &[SceneItem]) -> TrailResult<FrameRGBA>;
}

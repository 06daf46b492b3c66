use std::sync::Arc;

use crate::animation::tween::TweenId;
use crate::assets::pool::PoolImage;
use crate::foundation::core::{ImageId, Point, Size};
use crate::foundation::math::{Rng64, lerp};
use crate::recolor::cache::RecoloredVisual;
use crate::trail::config::SizeVariant;

/// Lifecycle of a slot. Transitions are made by the controller, never by the slot.
///
/// `Idle -> Spawning -> Visible -> [Recoloring -> Visible] -> Retiring -> Idle`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Not on screen; free for reuse.
    Idle,
    /// Being placed. Only observable inside a spawn decision.
    Spawning,
    /// On screen, original or fully recolored visual.
    Visible,
    /// Waiting for recolored pixels or cross-fading to them.
    Recoloring,
    /// Fading out.
    Retiring,
}

/// Color distortion applied to the overlay while a recolor develops.
///
/// Factors follow the CSS filter functions of the same name (1.0 = unchanged).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayFilter {
    /// `contrast()` factor.
    pub contrast: f64,
    /// `hue-rotate()` angle in degrees.
    pub hue_rotate_deg: f64,
    /// `saturate()` factor.
    pub saturate: f64,
}

impl OverlayFilter {
    /// No distortion.
    pub const IDENTITY: Self = Self {
        contrast: 1.0,
        hue_rotate_deg: 0.0,
        saturate: 1.0,
    };

    /// Distortion at cross-fade progress `p`: a slow contrast wobble with a slight hue and
    /// saturation drift, so the change reads as developing rather than cutting.
    pub fn developing(p: f64) -> Self {
        let p = p.clamp(0.0, 1.0);
        let wobble = (p * std::f64::consts::PI * 1.5).sin() * 0.08;
        Self {
            contrast: 1.0 + wobble * 0.2,
            hue_rotate_deg: p * 2.0,
            saturate: 1.0 + p * 0.15,
        }
    }

    /// Whether this filter leaves colors unchanged.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for OverlayFilter {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pick a spawn size. Pure in `seed`, so callers control determinism.
///
/// `variants` must be non-empty (enforced by configuration validation).
pub fn pick_variant(seed: u64, variants: &[SizeVariant]) -> SizeVariant {
    let mut rng = Rng64::new(seed);
    variants[rng.index(variants.len())]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct IntroMotion {
    pub(crate) from_center: Point,
    pub(crate) to_center: Point,
    pub(crate) from_scale: f64,
    pub(crate) to_rotation_deg: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SlotTweens {
    pub(crate) intro: Option<TweenId>,
    pub(crate) recolor: Option<TweenId>,
    pub(crate) retire: Option<TweenId>,
}

/// One reusable on-screen instance of a pool image. Passive data, owned by the controller.
#[derive(Clone, Debug)]
pub struct TrailSlot {
    image: Arc<PoolImage>,
    pub(crate) state: SlotState,
    pub(crate) generation: u64,
    pub(crate) center: Point,
    pub(crate) size: Size,
    pub(crate) scale: f64,
    pub(crate) rotation_deg: f64,
    pub(crate) opacity: f64,
    pub(crate) z_order: u32,
    pub(crate) recolor_progress: f64,
    pub(crate) recolored: bool,
    pub(crate) overlay: Option<Arc<RecoloredVisual>>,
    pub(crate) filter: OverlayFilter,
    pub(crate) intro: Option<IntroMotion>,
    pub(crate) tweens: SlotTweens,
}

impl TrailSlot {
    pub(crate) fn new(image: Arc<PoolImage>) -> Self {
        Self {
            image,
            state: SlotState::Idle,
            generation: 0,
            center: Point::ORIGIN,
            size: Size::ZERO,
            scale: 1.0,
            rotation_deg: 0.0,
            opacity: 0.0,
            z_order: 0,
            recolor_progress: 0.0,
            recolored: false,
            overlay: None,
            filter: OverlayFilter::IDENTITY,
            intro: None,
            tweens: SlotTweens::default(),
        }
    }

    /// Pool image this slot shows.
    pub fn image(&self) -> &Arc<PoolImage> {
        &self.image
    }

    /// Pool identity of the image.
    pub fn image_id(&self) -> ImageId {
        self.image.id()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Spawn counter of this slot; changes every time the slot is reused.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Center in surface coordinates.
    pub fn center(&self) -> Point {
        self.center
    }

    /// Unscaled size.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Uniform scale around the center.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Rotation in degrees, clockwise.
    pub fn rotation_deg(&self) -> f64 {
        self.rotation_deg
    }

    /// Whole-slot opacity.
    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    /// Paint order; higher draws above.
    pub fn z_order(&self) -> u32 {
        self.z_order
    }

    /// Cross-fade progress in `[0, 1]`; also the overlay opacity.
    pub fn recolor_progress(&self) -> f64 {
        self.recolor_progress
    }

    /// Whether the recolor transition completed.
    pub fn is_recolored(&self) -> bool {
        self.recolored
    }

    /// Recolored visual layered over the base image, if any.
    pub fn overlay(&self) -> Option<&Arc<RecoloredVisual>> {
        self.overlay.as_ref()
    }

    /// Overlay distortion.
    pub fn filter(&self) -> OverlayFilter {
        self.filter
    }

    /// Whether the slot is drawn at all.
    pub fn is_live(&self) -> bool {
        self.state != SlotState::Idle
    }

    pub(crate) fn reset_recolor(&mut self) {
        self.recolor_progress = 0.0;
        self.recolored = false;
        self.overlay = None;
        self.filter = OverlayFilter::IDENTITY;
        self.tweens.recolor = None;
    }

    pub(crate) fn deactivate(&mut self) {
        self.reset_recolor();
        self.state = SlotState::Idle;
        self.opacity = 0.0;
        self.scale = 1.0;
        self.intro = None;
        self.tweens = SlotTweens::default();
    }

    pub(crate) fn apply_intro(&mut self, eased: f64) {
        let Some(m) = self.intro else {
            return;
        };
        self.center = m.from_center.lerp(m.to_center, eased);
        self.scale = lerp(m.from_scale, 1.0, eased);
        self.rotation_deg = lerp(0.0, m.to_rotation_deg, eased);
    }

    pub(crate) fn apply_recolor(&mut self, eased: f64) {
        self.recolor_progress = eased.clamp(0.0, 1.0);
        self.filter = OverlayFilter::developing(self.recolor_progress);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/trail/slot.rs"]
mod tests;

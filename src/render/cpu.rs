use rayon::prelude::*;

use crate::assets::pool::PixelBuffer;
use crate::foundation::core::{Point, Rect, Size};
use crate::foundation::error::{TrailError, TrailResult};
use crate::render::backend::{FrameRGBA, RenderSettings, RenderSurface, SceneItem};
use crate::render::composite::{FilterMatrix, over, premultiply, quantize};

/// Headless reference surface: bilinear cover-fit sampling and premultiplied source-over.
pub struct CpuSurface {
    width: u32,
    height: u32,
    settings: RenderSettings,
}

impl CpuSurface {
    pub fn new(width: u32, height: u32, settings: RenderSettings) -> TrailResult<Self> {
        if width == 0 || height == 0 {
            return Err(TrailError::validation("surface width/height must be non-zero"));
        }
        Ok(Self {
            width,
            height,
            settings,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl RenderSurface for CpuSurface {
    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    fn render_scene(&mut self, items: &[SceneItem]) -> TrailResult<FrameRGBA> {
        let clear = quantize(premultiply(self.settings.clear_rgba.unwrap_or([0, 0, 0, 0])));
        let mut data = vec![0u8; self.width as usize * self.height as usize * 4];
        for px in data.chunks_exact_mut(4) {
            px.copy_from_slice(&clear);
        }

        for item in items {
            draw_item(&mut data, self.width, self.height, item);
        }

        Ok(FrameRGBA {
            width: self.width,
            height: self.height,
            data,
            premultiplied: true,
        })
    }
}

/// Maps item-local points to source texels so the image covers the item box (cropping overflow).
struct CoverFit {
    inv_scale: f64,
    half_w: f64,
    half_h: f64,
}

impl CoverFit {
    fn new(img: &PixelBuffer, size: Size) -> Self {
        let iw = f64::from(img.width().max(1));
        let ih = f64::from(img.height().max(1));
        let s = (size.width / iw).max(size.height / ih);
        Self {
            inv_scale: 1.0 / s,
            half_w: iw / 2.0,
            half_h: ih / 2.0,
        }
    }

    fn sample(&self, img: &PixelBuffer, p: Point) -> [f32; 4] {
        sample_bilinear(
            img,
            p.x * self.inv_scale + self.half_w,
            p.y * self.inv_scale + self.half_h,
        )
    }
}

fn draw_item(data: &mut [u8], width: u32, height: u32, item: &SceneItem) {
    if item.opacity <= 0.0 || item.scale <= 0.0 || item.size.is_zero_area() {
        return;
    }
    let Some(base) = item.base.as_deref() else {
        return;
    };

    let affine = item.transform();
    if affine.determinant().abs() < 1e-12 {
        return;
    }
    let inv = affine.inverse();
    let canvas = Rect::new(0.0, 0.0, f64::from(width), f64::from(height));
    let bounds = item.bounds().intersect(canvas);
    if bounds.is_zero_area() {
        return;
    }
    let y0 = bounds.y0.floor().max(0.0) as usize;
    let y1 = (bounds.y1.ceil() as usize).min(height as usize);
    let x0 = bounds.x0.floor().max(0.0) as usize;
    let x1 = (bounds.x1.ceil() as usize).min(width as usize);

    let local = item.local_rect();
    let base_fit = CoverFit::new(base, item.size);
    let overlay = item
        .overlay
        .as_deref()
        .filter(|_| item.overlay_opacity > 0.0)
        .map(|img| (img, CoverFit::new(img, item.size)));
    let filter = FilterMatrix::new(&item.filter);
    let filtered = !filter.is_identity();
    let overlay_opacity = item.overlay_opacity as f32;
    let opacity = item.opacity as f32;

    data.par_chunks_exact_mut(width as usize * 4)
        .enumerate()
        .skip(y0)
        .take(y1.saturating_sub(y0))
        .for_each(|(y, row)| {
            for x in x0..x1 {
                let p = inv * Point::new(x as f64 + 0.5, y as f64 + 0.5);
                if !local.contains(p) {
                    continue;
                }
                let mut src = quantize(base_fit.sample(base, p));
                if let Some((img, fit)) = &overlay {
                    let mut top = fit.sample(img, p);
                    if filtered {
                        top = filter.apply(top);
                    }
                    src = over(src, quantize(top), overlay_opacity);
                }
                let i = x * 4;
                let dst = [row[i], row[i + 1], row[i + 2], row[i + 3]];
                row[i..i + 4].copy_from_slice(&over(dst, src, opacity));
            }
        });
}

fn sample_bilinear(img: &PixelBuffer, x: f64, y: f64) -> [f32; 4] {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return [0.0; 4];
    }
    let fx = (x - 0.5).clamp(0.0, f64::from(w - 1));
    let fy = (y - 0.5).clamp(0.0, f64::from(h - 1));
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let tx = (fx - f64::from(x0)) as f32;
    let ty = (fy - f64::from(y0)) as f32;

    let at = |x: u32, y: u32| premultiply(img.get_pixel(x, y).0);
    let top = lerp4(at(x0, y0), at(x1, y0), tx);
    let bottom = lerp4(at(x0, y1), at(x1, y1), tx);
    lerp4(top, bottom, ty)
}

fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
        a[3] + (b[3] - a[3]) * t,
    ]
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;

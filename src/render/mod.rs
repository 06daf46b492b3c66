pub mod backend;
pub mod composite;
pub mod cpu;

pub use backend::{FrameRGBA, RenderSettings, RenderSurface, SceneItem};
pub use cpu::CpuSurface;

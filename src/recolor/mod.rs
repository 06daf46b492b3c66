pub mod cache;
pub mod transform;

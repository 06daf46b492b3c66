pub mod color;
pub mod pool;

pub mod config;
pub mod controller;
pub mod pointer;
pub mod slot;

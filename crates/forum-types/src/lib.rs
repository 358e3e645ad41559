pub mod api;
pub mod frames;
pub mod models;

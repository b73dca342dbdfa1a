pub mod app;
pub mod common;
pub mod config;
pub mod geodata;
pub mod model;
pub mod nginx;
pub mod xray;

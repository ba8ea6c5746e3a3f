//! Banner content service: feature/tag addressed banners served through a
//! two-tier cache, with versioned history and throttled bulk deletion.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

//! Application services layer.

pub mod banners;
pub mod error;
pub mod repos;

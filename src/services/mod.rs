pub mod classifier;
pub mod conversion;
pub mod converter;
pub mod download;
pub mod lifecycle;
pub mod staging;
pub mod worker;

//! Batch jobs run against the Stash server

pub mod eta;
pub mod tag_thumbnails;

pub use tag_thumbnails::TagThumbnailJob;

//! Command-line tools and HTTP service for audio provenance classification

pub mod output;
pub mod server;

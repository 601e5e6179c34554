mod client;
mod config;
mod odata;

pub use client::FrostClient;
pub use config::FrostConfig;
pub use odata::{datastream_filter, escape_literal};

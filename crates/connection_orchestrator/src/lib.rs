pub mod domain;
pub mod http;
pub mod mqtt;

pub use domain::*;

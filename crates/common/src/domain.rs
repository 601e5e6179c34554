mod connection;
mod counters;
mod credential;
mod observation;
mod result;
mod uploader;

pub use connection::*;
pub use counters::*;
pub use credential::*;
pub use observation::*;
pub use result::*;
pub use uploader::*;

mod json_transport;
mod netatmo_transport;
mod polling_connection;

pub use json_transport::*;
pub use netatmo_transport::*;
pub use polling_connection::*;

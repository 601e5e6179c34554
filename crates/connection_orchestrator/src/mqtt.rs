mod broker;
mod mqtt_transport;
mod subscription_connection;

pub use broker::*;
pub use mqtt_transport::*;
pub use subscription_connection::*;

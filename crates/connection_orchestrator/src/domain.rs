mod application_config;
mod application_connection;
mod connection;
mod connection_state;
mod cycle_pipeline;
mod supervisor;
mod transport_factory;
mod transport_guard;
mod worker;

pub use application_config::*;
pub use application_connection::*;
pub use connection::*;
pub use connection_state::*;
pub use cycle_pipeline::*;
pub use supervisor::*;
pub use transport_factory::*;
pub use transport_guard::*;

//! Vendor payload handling for sensor applications.
//!
//! Two pure stages sit between a connection and the uploader:
//! - an [`ApplicationUnpacker`] turns a vendor-native payload into a
//!   per-sensor field map
//! - the reading transformer turns one sensor's field map into canonical
//!   observations using the [`FieldTable`] of the sensor's model
//!
//! Neither stage performs I/O or holds state.

mod application_kind;
mod sensor_model;
mod transformer;
mod unpacker;
pub mod unpackers;

pub use application_kind::ApplicationKind;
pub use sensor_model::{FieldTable, SensorModel};
pub use transformer::{transform, ObservationStream};
pub use unpacker::ApplicationUnpacker;

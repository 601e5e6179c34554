mod netatmo;
mod null;
mod the_things_stack;

pub use netatmo::{NetatmoUnpacker, NETATMO_UNPACKER};
pub use null::{NullUnpacker, NULL_UNPACKER};
pub use the_things_stack::{TheThingsStackUnpacker, THE_THINGS_STACK_UNPACKER};

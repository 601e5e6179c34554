mod file_credential_source;

pub use file_credential_source::*;

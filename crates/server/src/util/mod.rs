pub mod digest;

pub use digest::{compute_digest, parse_resource_path, storage_key};

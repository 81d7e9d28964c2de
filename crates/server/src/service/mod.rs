pub mod action_cache;
pub mod bytestream;
pub mod cas;
pub mod status;

pub use action_cache::ActionCacheService;
pub use bytestream::ByteStreamService;
pub use cas::CasService;

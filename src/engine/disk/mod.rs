mod disk_reader;
mod disk_service;
mod encrypted_stream;
mod memory_cache;
mod stream_pool;

pub(crate) use disk_reader::*;
pub(crate) use disk_service::*;
pub(crate) use encrypted_stream::ENCRYPTION_MARKER;
pub use encrypted_stream::{EncryptedStreamFactory, is_encrypted};
pub(crate) use memory_cache::*;
pub(crate) use stream_pool::*;

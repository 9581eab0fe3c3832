/*!
 *! # LiteDB in Rust
 *! This is a reimplementation of [LiteDB] in Rust.
 *!
 *! This implementation (currently?) only supports single-threaded operation.
 *!
 *! [LiteDB]: https://www.litedb.org/
 */

#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

use crate::bson::Value;
use crate::engine::PageType;

#[macro_use]
pub mod bson;
pub mod engine;
pub mod expression;
mod utils;

#[cfg(feature = "tokio-fs")]
mod tokio_fs;

pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy of the engine (see the error-handling design notes).
///
/// Transactional errors roll back the offending transaction and are handed
/// back to the caller as-is. `Io` errors raised while draining the writer
/// queue are latched by the disk service and re-raised on every later
/// mutating call until the engine is reopened.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying stream failure. Fatal for the current transaction; once
    /// raised from the writer queue it degrades the engine to read-only.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Checksum/shape violation while decoding a page, document or index key.
    #[error("database corruption: {0}")]
    Corruption(String),

    /// A page was read and did not have the expected [`PageType`].
    #[error("invalid page type: expected {expected:?}, got {actual:?} (page {page_id})")]
    InvalidPageType {
        expected: PageType,
        actual: PageType,
        page_id: u32,
    },

    /// Database- or collection-level lock was not acquired within the
    /// configured timeout.
    #[error("timed out waiting for lock on {target} after {timeout:?}")]
    LockTimeout {
        target: String,
        timeout: std::time::Duration,
    },

    /// Key is `Min`/`MaxValue` or exceeds `MAX_INDEX_KEY_LENGTH`.
    #[error("invalid index key: {0}")]
    InvalidIndexKey(String),

    /// Unique index constraint violation.
    #[error("duplicate key in index {index}: {key:?}")]
    IndexDuplicateKey { index: String, key: Value },

    /// `LIMIT_SIZE` pragma exceeded, or a single document exceeds the
    /// maximum document size.
    #[error("data size exceeded: {0}")]
    DataSizeExceeded(String),

    /// File is encrypted and no password was supplied.
    #[error("database is encrypted; a password is required")]
    EncryptionRequired,

    /// File is encrypted and the supplied password does not derive the
    /// stored key.
    #[error("wrong password")]
    WrongPassword,

    /// Header signature mismatch, or any other structurally invalid file.
    #[error("invalid database file: {0}")]
    InvalidDatabase(String),

    /// Collection, index, or sequence already exists.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// Collection, index, or page was not found where one was expected.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The engine was dropped or reported an unrecoverable I/O error and is
    /// refusing further mutations until it is reopened.
    #[error("engine is in a fatally broken, read-only state")]
    EngineBroken,

    #[error(transparent)]
    Bson(#[from] bson::ParseError),

    #[error(transparent)]
    Expression(#[from] expression::ParseError),

    #[error("invalid utf8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    pub(crate) fn invalid_database(message: impl Into<String>) -> Error {
        Error::InvalidDatabase(message.into())
    }

    pub(crate) fn invalid_page() -> Error {
        Error::Corruption("invalid page".into())
    }

    pub(crate) fn datetime_overflow() -> Self {
        Error::Corruption("DateTime overflow".into())
    }

    pub(crate) fn encrypted_no_password() -> Self {
        Error::EncryptionRequired
    }

    pub(crate) fn wrong_password() -> Self {
        Error::WrongPassword
    }

    pub(crate) fn collation_not_match() -> Error {
        Error::Corruption("collation does not match stored database collation".into())
    }

    pub(crate) fn invalid_page_type(expected: PageType, page: &impl PageLike) -> Error {
        Error::InvalidPageType {
            expected,
            actual: page.page_type(),
            page_id: page.page_id(),
        }
    }

    pub(crate) fn collection_index_limit_reached() -> Error {
        Error::DataSizeExceeded("collection reached its maximum number of indexes (255)".into())
    }

    pub(crate) fn name_length_header_space(name: &str) -> Error {
        Error::DataSizeExceeded(format!(
            "name length exceeds available header space: {}",
            name
        ))
    }

    pub(crate) fn invalid_collection_name(name: &str) -> Error {
        Error::InvalidDatabase(format!("invalid collection name: {}", name))
    }

    pub(crate) fn no_free_space_page(page_id: u32, available: usize, need: usize) -> Error {
        Error::Corruption(format!(
            "no free space in page {} (available: {}, need: {})",
            page_id, available, need
        ))
    }

    pub(crate) fn invalid_bson() -> Error {
        Error::Corruption("invalid BSON".into())
    }

    pub(crate) fn size_limit_reached() -> Self {
        Error::DataSizeExceeded("LIMIT_SIZE pragma exceeded".into())
    }

    pub(crate) fn transaction_limit() -> Error {
        Error::DataSizeExceeded("maximum number of open transactions reached".into())
    }

    pub(crate) fn invalid_index_key(message: impl Into<String>) -> Error {
        Error::InvalidIndexKey(message.into())
    }

    pub(crate) fn invalid_index_key_tag() -> Error {
        Error::InvalidIndexKey("unrecognised BSON type tag".into())
    }

    pub(crate) fn index_duplicate_key(index: &str, key: Value) -> Error {
        Error::IndexDuplicateKey {
            index: index.into(),
            key,
        }
    }

    pub(crate) fn already_exists_collection_name(name: &str) -> Error {
        Error::AlreadyExists {
            kind: "collection",
            name: name.into(),
        }
    }

    pub(crate) fn document_size_exceed_limit() -> Self {
        Error::DataSizeExceeded("document exceeds the maximum document size".into())
    }

    pub(crate) fn index_already_exists(name: &str) -> Error {
        Error::AlreadyExists {
            kind: "index",
            name: name.into(),
        }
    }

    pub(crate) fn collection_not_found(name: &str) -> Error {
        Error::NotFound {
            kind: "collection",
            name: name.into(),
        }
    }

    pub(crate) fn index_not_found(name: &str) -> Error {
        Error::NotFound {
            kind: "index",
            name: name.into(),
        }
    }

    pub(crate) fn lock_timeout(target: impl Into<String>, timeout: std::time::Duration) -> Error {
        Error::LockTimeout {
            target: target.into(),
            timeout,
        }
    }

    pub(crate) fn drop_id_index() -> Error {
        Error::InvalidIndexKey("the `_id` index cannot be dropped".into())
    }
}

/// Minimal view over a page needed to build an [`Error::InvalidPageType`];
/// implemented for `BasePage` and the typed page codecs.
pub(crate) trait PageLike {
    fn page_type(&self) -> PageType;
    fn page_id(&self) -> u32;
}

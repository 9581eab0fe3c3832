mod collection;
mod delete;
mod index;
mod insert;
mod query;
#[cfg(feature = "sequential-index")]
mod sequence;
mod transaction;
mod update;
mod upsert;

use crate::engine::disk::DiskService;
use crate::engine::lock_service::LockService;
use crate::engine::pages::HeaderPage;
use crate::engine::sort_disk::SortDisk;
use crate::engine::transaction_monitor::TransactionMonitor;
use crate::engine::transaction_service::{LockMode, TransactionService};
use crate::engine::wal_index_service::WalIndexService;
use crate::engine::{CONTAINER_SORT_SIZE, FileOrigin, StreamFactory};
use crate::utils::{CaseInsensitiveString, Collation, Shared};
use crate::{Error, Result};
use async_lock::Mutex;
use futures::StreamExt;
use std::collections::HashMap;
use std::pin::pin;
use std::rc::Rc;

pub use insert::BsonAutoId;
pub use query::Order;

/// To open a password-protected file, wrap `data_stream` (and, if it should
/// also be encrypted, `log_stream`) in [`crate::engine::EncryptedStreamFactory`]
/// before building this struct; [`crate::engine::is_encrypted`] tells you
/// whether an existing file needs one.
pub struct LiteSettings<SF: StreamFactory> {
    pub data_stream: SF,
    pub log_stream: SF,
    pub temp_stream: SF,
    /// If the header's invalid-datafile-state byte is set on open, this
    /// requests an automatic rebuild. No rebuild routine exists (building
    /// a new datafile from the surviving pages of a corrupt one needs a
    /// page-by-page export/import tool this crate doesn't implement), so
    /// setting this only changes the failure mode: opening such a file
    /// returns [`crate::Error::InvalidDatabase`] instead of silently
    /// proceeding against a file the previous session marked broken.
    pub auto_build: bool,
    pub collation: Option<Collation>,
}

pub struct LiteEngine<SF: StreamFactory> {
    locker: Rc<LockService>,
    disk: Rc<DiskService<SF>>,
    wal_index: Rc<WalIndexService>,
    header: Shared<HeaderPage>,
    monitor: Shared<TransactionMonitor<SF>>,
    sort_disk: Rc<SortDisk<SF>>,
    // state,
    // settings,
    // system_collections, // we use match
    sequences: Mutex<HashMap<CaseInsensitiveString, i64>>,
}

/// Borrows everything a single in-flight transaction needs off the owning
/// [`LiteEngine`]. Built fresh for the lifetime of one `with_transaction`
/// call; operations in sibling modules (`insert`, `delete`, `query`, ...)
/// are implemented against this type.
pub(crate) struct TransactionLiteEngine<'a, SF: StreamFactory> {
    disk: &'a Rc<DiskService<SF>>,
    header: &'a Shared<HeaderPage>,
    #[cfg(feature = "sequential-index")]
    sequences: &'a Mutex<HashMap<CaseInsensitiveString, i64>>,
    transaction: &'a mut TransactionService<SF>,
}

impl<SF: StreamFactory> LiteEngine<SF> {
    pub async fn new(settings: LiteSettings<SF>) -> Result<Self> {
        // SystemCollection
        // sequences
        // TODO: upgrade

        let disk = DiskService::new(
            settings.data_stream,
            settings.log_stream,
            settings.collation,
        )
        .await?;

        let header_buffer = pin!(disk.read_full(FileOrigin::Data))
            .next()
            .await
            .transpose()?
            .expect("no header page");

        // A caller that didn't pre-wrap `data_stream` in an
        // `EncryptedStreamFactory` sees the file's raw bytes here: the
        // marker only ever shows up when the file was created under a
        // password the caller didn't supply.
        if header_buffer.buffer()[0] == crate::engine::disk::ENCRYPTION_MARKER {
            return Err(Error::encrypted_no_password());
        }

        let mut header = if header_buffer.is_blank() {
            HeaderPage::new(header_buffer)
        } else {
            HeaderPage::load(header_buffer)?
        };

        if header.buffer().buffer()[HeaderPage::P_INVALID_DATAFILE_STATE] != 0
            && settings.auto_build
        {
            return Err(Error::invalid_database(
                "datafile is marked invalid by a previous session and automatic rebuild is not supported; restore it from a backup",
            ));
        }

        if let Some(collation) = settings.collation {
            if header.pragmas().collation() != collation {
                return Err(Error::collation_not_match());
            }
        }

        let locker = LockService::new(header.pragmas().clone());

        // no services are passed; they are passed when needed
        let wal_index = WalIndexService::new();

        if disk.get_file_length(FileOrigin::Log) > 0 {
            wal_index.restore_index(&mut header, &disk).await?;
        }

        let sort_disk = SortDisk::new(Box::new(settings.temp_stream), CONTAINER_SORT_SIZE);
        let sort_disk = Rc::new(sort_disk);

        let header = Shared::new(header);
        let locker = Rc::new(locker);
        let disk = Rc::new(disk);
        let wal_index = Rc::new(wal_index);
        let monitor = TransactionMonitor::new(
            Shared::clone(&header),
            Rc::clone(&locker),
            Rc::clone(&disk),
            Rc::clone(&wal_index),
        );
        let monitor = Shared::new(monitor);

        // system collections

        debug_log!(ENGINE: "initialization completed");

        Ok(Self {
            locker,
            disk,
            wal_index,
            header,
            monitor,
            sort_disk,
            sequences: Mutex::new(HashMap::new()),
        })
    }

    pub async fn soft_close(&mut self) -> Result<()> {
        // TODO: close other services
        self.wal_index
            .try_checkpoint(&self.disk, &self.locker)
            .await?;

        Ok(())
    }
}

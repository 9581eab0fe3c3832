use crate::Error;
use crate::Result;
use crate::engine::disk::disk_reader::DiskReader;
use crate::engine::disk::memory_cache::MemoryCache;
use crate::engine::disk::stream_pool::StreamPool;
use crate::engine::{FileOrigin, PAGE_SIZE, PageBuffer, Stream, StreamFactory};
use crate::utils::Collation;
use async_stream::try_stream;
use futures::io;
use futures::prelude::*;
use std::cell::Cell;
use std::marker::PhantomData;

/// Safety limit on the number of blocks followed along a linked list (data
/// blocks, index nodes) before giving up and treating the file as corrupt.
const MAX_ITEMS_COUNT: u32 = 1_000_000;

/// Owns the data and log streams and the shared page cache sitting above
/// them. Every method takes `&self`: callers hold this behind an `Rc` and
/// share it across every open transaction, so all mutable state here is
/// behind interior mutability (the pools lock internally, lengths live in a
/// `Cell` since the engine is single-threaded).
pub(crate) struct DiskService<SF: StreamFactory> {
    cache: MemoryCache,
    data_pool: StreamPool,
    log_pool: StreamPool,
    data_length: Cell<u64>,
    log_length: Cell<u64>,
    collation: Collation,
    /// Latched once a write comes back with an `Io` error. Every mutating
    /// entry point below checks this before touching the streams, and sets
    /// it the moment an `Io` error is observed, so one bad write degrades
    /// the whole engine to read-only instead of leaving it free to keep
    /// writing over a stream that is known to be failing.
    broken: Cell<bool>,
    _factory: PhantomData<SF>,
}

impl<SF: StreamFactory> DiskService<SF> {
    pub async fn new(
        data_stream: SF,
        log_stream: SF,
        collation: Option<Collation>,
    ) -> Result<Self> {
        let data_length = data_stream.len().await?;
        let log_length = if log_stream.exists().await {
            log_stream.len().await?
        } else {
            0
        };

        let disk = Self {
            cache: MemoryCache::new(),
            data_pool: StreamPool::new(Box::new(data_stream)),
            log_pool: StreamPool::new(Box::new(log_stream)),
            data_length: Cell::new(data_length),
            log_length: Cell::new(log_length),
            collation: collation.unwrap_or_default(),
            broken: Cell::new(false),
            _factory: PhantomData,
        };

        if data_length == 0 {
            disk.create_new_datafile().await?;
        }

        Ok(disk)
    }

    async fn create_new_datafile(&self) -> Result<()> {
        let buffer = self.cache.new_page();
        self.write_data_disk(std::slice::from_ref(&buffer)).await?;
        Ok(())
    }

    pub fn collation(&self) -> Collation {
        self.collation
    }

    pub fn cache(&self) -> &MemoryCache {
        &self.cache
    }

    pub fn max_items_count(&self) -> u32 {
        MAX_ITEMS_COUNT
    }

    pub fn new_page(&self) -> Box<PageBuffer> {
        self.cache.new_page()
    }

    pub async fn get_reader(&self) -> Result<DiskReader<'_>> {
        Ok(DiskReader::new(&self.cache, &self.data_pool, &self.log_pool))
    }

    pub fn get_file_length(&self, origin: FileOrigin) -> u64 {
        match origin {
            FileOrigin::Data => self.data_length.get(),
            FileOrigin::Log => self.log_length.get(),
        }
    }

    /// Returns [`Error::EngineBroken`] once a prior mutation has observed an
    /// `Io` error; every mutating entry point samples this first.
    fn check_broken(&self) -> Result<()> {
        if self.broken.get() {
            return Err(Error::EngineBroken);
        }
        Ok(())
    }

    fn latch_if_io_error<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(Error::Io(_)) = &result {
            self.broken.set(true);
        }
        result
    }

    pub async fn set_length(&self, length: u64, origin: FileOrigin) -> Result<()> {
        self.check_broken()?;

        let result: Result<()> = async {
            match origin {
                FileOrigin::Data => {
                    self.data_pool.writeable().await?.set_len(length).await?;
                    self.data_length.set(length);
                }
                FileOrigin::Log => {
                    self.log_pool.writeable().await?.set_len(length).await?;
                    self.log_length.set(length);
                }
            }

            Ok(())
        }
        .await;

        self.latch_if_io_error(result)
    }

    /// Streams every page currently stored in `origin`, in position order.
    pub fn read_full(
        &self,
        origin: FileOrigin,
    ) -> impl futures::Stream<Item = Result<Box<PageBuffer>>> + '_ {
        try_stream! {
            let length = self.get_file_length(origin);
            let mut reader = self.get_reader().await?;
            let mut position = 0u64;

            while position < length {
                let buffer = reader.read_writable_page(position, origin).await?;
                position += PAGE_SIZE as u64;
                yield buffer;
            }
        }
    }

    /// Appends `buffers` sequentially to the end of the log file, assigning
    /// each one its new position, then makes them visible through the
    /// readable cache. Returns the number of pages written.
    pub async fn write_log_disk(&self, buffers: Vec<Box<PageBuffer>>) -> Result<usize> {
        self.check_broken()?;

        if buffers.is_empty() {
            return Ok(0);
        }

        let count = buffers.len();
        let result: Result<(u64, Vec<Box<PageBuffer>>)> = async {
            let mut position = self.log_length.get();
            let mut writer = self.log_pool.writeable().await?;

            let mut positioned = Vec::with_capacity(count);
            for mut buffer in buffers {
                buffer.set_position_origin(position, FileOrigin::Log);

                writer.seek(io::SeekFrom::Start(position)).await?;
                writer.write_all(buffer.buffer()).await?;

                position += PAGE_SIZE as u64;
                positioned.push(buffer);
            }

            writer.flush().await?;
            drop(writer);

            Ok((position, positioned))
        }
        .await;

        let (position, positioned) = self.latch_if_io_error(result)?;

        self.log_length.set(position);

        for buffer in positioned {
            self.cache.move_to_readable(buffer);
        }

        Ok(count)
    }

    /// Writes each buffer back to its own recorded position in the data
    /// file. Used by checkpoint to copy confirmed log pages into place.
    pub async fn write_data_disk(&self, buffers: &[Box<PageBuffer>]) -> Result<()> {
        self.check_broken()?;

        if buffers.is_empty() {
            return Ok(());
        }

        let result: Result<()> = async {
            let mut writer = self.data_pool.writeable().await?;

            for buffer in buffers {
                writer.seek(io::SeekFrom::Start(buffer.position())).await?;
                writer.write_all(buffer.buffer()).await?;

                let end = buffer.position() + PAGE_SIZE as u64;
                if end > self.data_length.get() {
                    self.data_length.set(end);
                }
            }

            writer.flush().await?;

            Ok(())
        }
        .await;

        self.latch_if_io_error(result)
    }
}

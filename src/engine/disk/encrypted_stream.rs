use crate::engine::{PAGE_SIZE, Stream, StreamFactory};
use crate::{Error, Result};
use aes::Aes128;
use aes::cipher::KeyInit;
use async_lock::OnceCell;
use futures::io::{self, AsyncRead, AsyncSeek, AsyncWrite};
use futures::prelude::*;
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;
use std::pin::Pin;
use std::task::{Context, Poll};
use xts_mode::Xts128;

const SALT_LENGTH: usize = 16;
const KEY_LENGTH: usize = 32;
const PBKDF2_ROUNDS: u32 = 20_000;

/// Byte written at physical offset 0 of an encrypted file. Distinct from
/// every `PageType` discriminant (0-4) so a plain file is never mistaken
/// for an encrypted one.
pub(crate) const ENCRYPTION_MARKER: u8 = 0xFF;

fn derive_key(password: &str, salt: &[u8; SALT_LENGTH]) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha1>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
    key
}

fn make_xts(key: &[u8; KEY_LENGTH]) -> Xts128<Aes128> {
    let cipher_1 = Aes128::new_from_slice(&key[..16]).expect("key is 16 bytes");
    let cipher_2 = Aes128::new_from_slice(&key[16..]).expect("key is 16 bytes");
    Xts128::new(cipher_1, cipher_2)
}

/// Peeks the first byte of `factory`'s stream (without disturbing it for
/// later readers, since [`StreamFactory::get_stream`] opens a fresh handle)
/// to tell whether the file was created under a password.
pub async fn is_encrypted<F: StreamFactory>(factory: &F) -> Result<bool> {
    if !factory.exists().await || factory.len().await? == 0 {
        return Ok(false);
    }

    let mut stream = factory.get_stream(false).await?;
    let mut marker = [0u8; 1];
    stream.read_exact(&mut marker).await?;
    Ok(marker[0] == ENCRYPTION_MARKER)
}

/// Wraps another [`StreamFactory`] so every stream it opens is transparently
/// encrypted with XTS-AES-128. The wrapped file reserves its first
/// [`PAGE_SIZE`] bytes for a mode byte plus a random salt; logical offset 0
/// of the stream this factory hands out corresponds to physical offset
/// `PAGE_SIZE` in the underlying file. The AES/tweak key pair is derived
/// once (PBKDF2-HMAC-SHA1 over the password and that salt) and cached for
/// the lifetime of the factory, so every stream opened from it shares the
/// same cipher.
pub struct EncryptedStreamFactory<F: StreamFactory> {
    inner: F,
    password: String,
    key: OnceCell<[u8; KEY_LENGTH]>,
}

impl<F: StreamFactory> EncryptedStreamFactory<F> {
    pub fn new(inner: F, password: String) -> Self {
        Self {
            inner,
            password,
            key: OnceCell::new(),
        }
    }

    async fn key_for(&self, salt: [u8; SALT_LENGTH]) -> [u8; KEY_LENGTH] {
        *self
            .key
            .get_or_init(|| async move { derive_key(&self.password, &salt) })
            .await
    }
}

impl<F: StreamFactory> StreamFactory for EncryptedStreamFactory<F> {
    fn get_stream(
        &self,
        writable: bool,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn Stream>>> + '_>> {
        Box::pin(async move {
            let mut inner_stream = self.inner.get_stream(writable).await?;
            let is_new = !self.inner.exists().await || self.inner.len().await? == 0;

            let salt = if is_new {
                let salt: [u8; SALT_LENGTH] = rand::random();
                let mut header = vec![0u8; PAGE_SIZE];
                header[0] = ENCRYPTION_MARKER;
                header[1..1 + SALT_LENGTH].copy_from_slice(&salt);
                inner_stream.seek(io::SeekFrom::Start(0)).await?;
                inner_stream.write_all(&header).await?;
                inner_stream.flush().await?;
                salt
            } else {
                let mut header = vec![0u8; PAGE_SIZE];
                inner_stream.seek(io::SeekFrom::Start(0)).await?;
                inner_stream.read_exact(&mut header).await?;
                if header[0] != ENCRYPTION_MARKER {
                    return Err(Error::wrong_password());
                }
                let mut salt = [0u8; SALT_LENGTH];
                salt.copy_from_slice(&header[1..1 + SALT_LENGTH]);
                salt
            };

            let key = self.key_for(salt).await;

            Ok(Box::new(EncryptedStream::new(inner_stream, key)) as Box<dyn Stream>)
        })
    }

    fn exists(&self) -> Pin<Box<dyn Future<Output = bool> + '_>> {
        self.inner.exists()
    }

    fn len(&self) -> Pin<Box<dyn Future<Output = Result<u64>> + '_>> {
        Box::pin(async move {
            let len = self.inner.len().await?;
            Ok(len.saturating_sub(PAGE_SIZE as u64))
        })
    }

    fn delete(&self) -> Pin<Box<dyn Future<Output = Result<()>> + '_>> {
        self.inner.delete()
    }
}

enum ReadState {
    Idle,
    Filling { filled: usize },
}

enum WriteState {
    Idle,
    Flushing { written: usize },
}

/// A single opened, password-derived view over an [`EncryptedStreamFactory`]
/// file. Every logical position is physical position minus [`PAGE_SIZE`];
/// every sector (one page) is encrypted independently with
/// [`Xts128`], the sector index being its logical page number.
///
/// Reads and writes always go through a full-sector scratch buffer: callers
/// in this crate always perform whole, page-aligned `seek` + `read_exact` /
/// `write_all` pairs (see `disk_reader.rs`, `disk_service.rs`), but a single
/// `poll_read`/`poll_write` is allowed by the `futures::io` contract to see
/// only part of that page at a time, so the state below accumulates a
/// complete ciphertext sector before decrypting, and a complete plaintext
/// sector before encrypting.
pub(crate) struct EncryptedStream {
    inner: Box<dyn Stream>,
    xts: Xts128<Aes128>,
    logical_pos: u64,
    cached_sector: Option<(u64, Box<[u8; PAGE_SIZE]>)>,
    scratch: Box<[u8; PAGE_SIZE]>,
    read_state: ReadState,
    write_state: WriteState,
}

impl EncryptedStream {
    fn new(inner: Box<dyn Stream>, key: [u8; KEY_LENGTH]) -> Self {
        Self {
            inner,
            xts: make_xts(&key),
            logical_pos: 0,
            cached_sector: None,
            scratch: Box::new([0u8; PAGE_SIZE]),
            read_state: ReadState::Idle,
            write_state: WriteState::Idle,
        }
    }

    fn sector_of(pos: u64) -> (u64, usize) {
        (pos / PAGE_SIZE as u64, (pos % PAGE_SIZE as u64) as usize)
    }
}

impl AsyncRead for EncryptedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let (sector_index, offset_in_sector) = EncryptedStream::sector_of(this.logical_pos);

        if let Some((cached_index, cached)) = &this.cached_sector {
            if *cached_index == sector_index {
                let n = buf.len().min(PAGE_SIZE - offset_in_sector);
                buf[..n].copy_from_slice(&cached[offset_in_sector..offset_in_sector + n]);
                this.logical_pos += n as u64;
                return Poll::Ready(Ok(n));
            }
        }

        let filled = match this.read_state {
            ReadState::Idle => 0,
            ReadState::Filling { filled } => filled,
        };

        let mut filled = filled;
        loop {
            if filled == PAGE_SIZE {
                break;
            }
            // inner is already positioned: `poll_seek` lands it on this
            // sector's physical start, and a successful read advances it.
            match Pin::new(&mut *this.inner).poll_read(cx, &mut this.scratch[filled..]) {
                Poll::Ready(Ok(0)) => {
                    this.read_state = ReadState::Idle;
                    return Poll::Ready(Ok(0));
                }
                Poll::Ready(Ok(n)) => {
                    filled += n;
                    this.read_state = ReadState::Filling { filled };
                }
                Poll::Ready(Err(e)) => {
                    this.read_state = ReadState::Idle;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        this.read_state = ReadState::Idle;
        this.xts
            .decrypt_sector(&mut this.scratch[..], sector_index as u128);

        let plaintext = this.scratch.clone();
        let n = buf.len().min(PAGE_SIZE - offset_in_sector);
        buf[..n].copy_from_slice(&plaintext[offset_in_sector..offset_in_sector + n]);
        this.cached_sector = Some((sector_index, plaintext));
        this.logical_pos += n as u64;
        Poll::Ready(Ok(n))
    }
}

impl AsyncWrite for EncryptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let (sector_index, offset_in_sector) = EncryptedStream::sector_of(this.logical_pos);

        debug_assert_eq!(
            offset_in_sector, 0,
            "encrypted stream only supports page-aligned writes"
        );

        let written = match this.write_state {
            WriteState::Idle => {
                let n = buf.len().min(PAGE_SIZE);
                this.scratch[..n].copy_from_slice(&buf[..n]);
                if n < PAGE_SIZE {
                    // partial final write smaller than a page: caller (this
                    // crate) never does this, but zero-fill defensively so
                    // the sector still encrypts/decrypts deterministically.
                    this.scratch[n..].fill(0);
                }
                this.xts
                    .encrypt_sector(&mut this.scratch[..], sector_index as u128);
                this.cached_sector = None;
                0
            }
            WriteState::Flushing { written } => written,
        };

        loop {
            if written == PAGE_SIZE {
                this.write_state = WriteState::Idle;
                this.logical_pos += PAGE_SIZE as u64;
                return Poll::Ready(Ok(buf.len().min(PAGE_SIZE)));
            }
            match Pin::new(&mut *this.inner).poll_write(cx, &this.scratch[written..]) {
                Poll::Ready(Ok(0)) => {
                    this.write_state = WriteState::Idle;
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "encrypted stream: underlying write returned 0",
                    )));
                }
                Poll::Ready(Ok(n)) => {
                    this.write_state = WriteState::Flushing {
                        written: written + n,
                    };
                    continue;
                }
                Poll::Ready(Err(e)) => {
                    this.write_state = WriteState::Idle;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => {
                    this.write_state = WriteState::Flushing { written };
                    return Poll::Pending;
                }
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().inner).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.get_mut().inner).poll_close(cx)
    }
}

impl AsyncSeek for EncryptedStream {
    fn poll_seek(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        pos: io::SeekFrom,
    ) -> Poll<io::Result<u64>> {
        let this = self.get_mut();

        let physical_pos = match pos {
            io::SeekFrom::Start(p) => io::SeekFrom::Start(p + PAGE_SIZE as u64),
            other => other,
        };

        match Pin::new(&mut *this.inner).poll_seek(cx, physical_pos) {
            Poll::Ready(Ok(physical)) => {
                let logical = physical.saturating_sub(PAGE_SIZE as u64);
                this.logical_pos = logical;
                this.read_state = ReadState::Idle;
                this.write_state = WriteState::Idle;
                Poll::Ready(Ok(logical))
            }
            other => other,
        }
    }
}

impl Stream for EncryptedStream {
    fn set_len(&self, len: u64) -> Pin<Box<dyn Future<Output = Result<()>> + '_>> {
        self.inner.set_len(len + PAGE_SIZE as u64)
    }
}

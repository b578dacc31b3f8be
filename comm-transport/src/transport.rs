//! Transport capability consumed by the engine

use async_trait::async_trait;
use comm_core::CommResult;

/// Duplex byte transport driven by the engine's reactor
///
/// Every method takes `&self` so that one read and one write can be in
/// flight at the same time. Implementations keep their read and write
/// sides independently synchronized.
///
/// The engine guarantees that it never has more than one `read` and more
/// than one `write` outstanding at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the physical connection
    ///
    /// # Errors
    /// Returns error if the transport is already open or the device,
    /// socket or connection cannot be set up
    async fn open(&self) -> CommResult<()>;

    /// Release the physical connection
    ///
    /// Closing an already closed transport is a no-op.
    async fn close(&self) -> CommResult<()>;

    /// Check if the transport is currently open
    fn is_open(&self) -> bool;

    /// Read once into `buf`
    ///
    /// # Returns
    /// Number of bytes read. Zero is a valid completion.
    async fn read(&self, buf: &mut [u8]) -> CommResult<usize>;

    /// Write once from `buf`
    ///
    /// # Returns
    /// Number of bytes accepted, which may be less than `buf.len()`
    async fn write(&self, buf: &[u8]) -> CommResult<usize>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn open(&self) -> CommResult<()> {
        (**self).open().await
    }

    async fn close(&self) -> CommResult<()> {
        (**self).close().await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn read(&self, buf: &mut [u8]) -> CommResult<usize> {
        (**self).read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> CommResult<usize> {
        (**self).write(buf).await
    }
}

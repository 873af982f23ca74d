//! Byte-stream link to the gateway.

use alloc::boxed::Box;
use embedded_io_async::{Read, Write};

/// A bidirectional byte stream that can be opened and closed.
///
/// A read returning zero bytes signals that the link has been closed.
#[async_trait::async_trait(?Send)]
pub trait Transport: Read + Write {
    /// Opens the link.
    async fn open(&mut self) -> Result<(), Self::Error>;

    /// Closes the link.
    async fn close(&mut self) -> Result<(), Self::Error>;
}

#[async_trait::async_trait(?Send)]
impl<T: Transport + ?Sized> Transport for &mut T {
    async fn open(&mut self) -> Result<(), Self::Error> {
        (**self).open().await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close().await
    }
}

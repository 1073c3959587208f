use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt, ReadBuf};

/// Any seekable reader that can back a download.
pub trait SeekableHandle: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableHandle for T {}

/// Where the bytes of a download come from.
///
/// The variant is chosen once at construction. The source is owned by the
/// response it backs and is released when that response body is dropped,
/// whether it finished, failed or was cancelled.
pub enum ByteSource {
    File(tokio::fs::File),
    Buffer(io::Cursor<Bytes>),
    Handle(Box<dyn SeekableHandle>),
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteSource::File(file) => f.debug_tuple("File").field(file).finish(),
            ByteSource::Buffer(cursor) => f.debug_tuple("Buffer").field(&cursor.get_ref().len()).finish(),
            ByteSource::Handle(_) => f.write_str("Handle"),
        }
    }
}

impl ByteSource {
    /// Opens the file at `path` for reading.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<ByteSource> {
        let file = tokio::fs::File::open(path).await?;
        Ok(ByteSource::File(file))
    }

    pub fn buffer(data: impl Into<Bytes>) -> ByteSource {
        ByteSource::Buffer(io::Cursor::new(data.into()))
    }

    pub fn handle(handle: impl SeekableHandle + 'static) -> ByteSource {
        ByteSource::Handle(Box::new(handle))
    }

    /// Total length in bytes.
    ///
    /// Files report their metadata size, buffers their length, and handles are
    /// measured by seeking to the end. Every read starts with a seek, so
    /// moving the position here is harmless.
    pub async fn length(&mut self) -> io::Result<u64> {
        match self {
            ByteSource::File(file) => Ok(file.metadata().await?.len()),
            ByteSource::Buffer(cursor) => Ok(cursor.get_ref().len() as u64),
            ByteSource::Handle(handle) => handle.seek(io::SeekFrom::End(0)).await,
        }
    }
}

impl AsyncRead for ByteSource {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ByteSource::File(file) => Pin::new(file).poll_read(cx, buf),
            ByteSource::Buffer(cursor) => Pin::new(cursor).poll_read(cx, buf),
            ByteSource::Handle(handle) => Pin::new(handle).poll_read(cx, buf),
        }
    }
}

impl AsyncSeek for ByteSource {
    fn start_seek(self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        match self.get_mut() {
            ByteSource::File(file) => Pin::new(file).start_seek(position),
            ByteSource::Buffer(cursor) => Pin::new(cursor).start_seek(position),
            ByteSource::Handle(handle) => Pin::new(handle).start_seek(position),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        match self.get_mut() {
            ByteSource::File(file) => Pin::new(file).poll_complete(cx),
            ByteSource::Buffer(cursor) => Pin::new(cursor).poll_complete(cx),
            ByteSource::Handle(handle) => Pin::new(handle).poll_complete(cx),
        }
    }
}

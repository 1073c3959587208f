use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Sleep;

use crate::{AsyncSeekStart, ByteSource, ByteSpan, DownloadConfig, DownloadError};

/// Response body for one contiguous span of the source (or all of it).
/// Implements [`Stream`], [`Body`], and [`IntoResponse`].
///
/// Reads at most `chunk_size` bytes per chunk and, when throttling is
/// configured, sleeps between chunks. Dropping the stream stops the transfer
/// and releases the source.
#[pin_project]
pub struct RangedStream {
    state: StreamState,
    length: u64,
    remaining: u64,
    chunk_size: usize,
    throttle: Option<Duration>,
    buffer: BytesMut,
    progress: TransferProgress,
    #[pin]
    source: ByteSource,
}

impl RangedStream {
    pub(crate) fn new(source: ByteSource, start: u64, length: u64, config: &DownloadConfig) -> Self {
        RangedStream {
            state: StreamState::Seek { start },
            length,
            remaining: length,
            chunk_size: config.chunk_size(),
            throttle: config.throttle_delay(),
            buffer: BytesMut::new(),
            progress: TransferProgress { expected: length, sent: 0, finished: false },
            source,
        }
    }

    /// Gives the source back, e.g. to stream another span from it.
    pub(crate) fn into_inner(self) -> ByteSource {
        self.source
    }
}

impl std::fmt::Debug for RangedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("length", &self.length)
            .field("remaining", &self.remaining)
            .finish()
    }
}

enum StreamState {
    Seek { start: u64 },
    Seeking,
    Reading,
    Throttled { delay: Pin<Box<Sleep>> },
    Done,
}

/// Notes transfers that end before their span was fully sent.
struct TransferProgress {
    expected: u64,
    sent: u64,
    finished: bool,
}

impl Drop for TransferProgress {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                sent = self.sent,
                expected = self.expected,
                "transfer cancelled, releasing byte source"
            );
        }
    }
}

fn fail(state: &mut StreamState, progress: &mut TransferProgress, error: io::Error) -> DownloadError {
    tracing::error!(%error, sent = progress.sent, expected = progress.expected, "byte source failed mid-transfer");
    *state = StreamState::Done;
    progress.finished = true;
    DownloadError::SourceIo(error)
}

impl IntoResponse for RangedStream {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl Body for RangedStream {
    type Data = Bytes;
    type Error = DownloadError;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<Result<Frame<Bytes>, DownloadError>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl Stream for RangedStream {
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<Result<Bytes, DownloadError>>> {
        let mut this = self.project();

        loop {
            match this.state {
                StreamState::Seek { start } => {
                    let start = *start;
                    match this.source.as_mut().start_seek(start) {
                        Err(e) => return Poll::Ready(Some(Err(fail(this.state, this.progress, e)))),
                        Ok(()) => *this.state = StreamState::Seeking,
                    }
                }

                StreamState::Seeking => {
                    match this.source.as_mut().poll_complete(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(fail(this.state, this.progress, e)))),
                        Poll::Ready(Ok(())) => *this.state = StreamState::Reading,
                    }
                }

                StreamState::Throttled { delay } => {
                    if delay.as_mut().poll(cx).is_pending() {
                        return Poll::Pending;
                    }
                    *this.state = StreamState::Reading;
                }

                StreamState::Reading => {
                    if *this.remaining == 0 {
                        *this.state = StreamState::Done;
                        this.progress.finished = true;
                        return Poll::Ready(None);
                    }

                    // read the smaller of the chunk size and the bytes left in the span
                    let nbytes = std::cmp::min(
                        *this.chunk_size,
                        usize::try_from(*this.remaining).unwrap_or(usize::MAX),
                    );
                    this.buffer.reserve(nbytes);

                    let uninit = this.buffer.spare_capacity_mut();
                    let mut read_buf = ReadBuf::uninit(&mut uninit[..nbytes]);

                    match this.source.as_mut().poll_read(cx, &mut read_buf) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(fail(this.state, this.progress, e)))),
                        Poll::Ready(Ok(())) => {}
                    }

                    let n = read_buf.filled().len();
                    if n == 0 {
                        let e = io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("byte source ended {} bytes before the end of the span", this.remaining),
                        );
                        return Poll::Ready(Some(Err(fail(this.state, this.progress, e))));
                    }

                    // SAFETY: poll_read has initialized `n` bytes of spare
                    // capacity; the buffer is always empty here since every
                    // chunk is split off below
                    unsafe { this.buffer.set_len(this.buffer.len() + n); }
                    let chunk = this.buffer.split().freeze();

                    // n <= remaining because of the cmp::min above
                    *this.remaining -= n as u64;
                    this.progress.sent += n as u64;

                    if *this.remaining > 0 {
                        if let Some(delay) = *this.throttle {
                            *this.state = StreamState::Throttled { delay: Box::pin(tokio::time::sleep(delay)) };
                        }
                    }

                    return Poll::Ready(Some(Ok(chunk)));
                }

                StreamState::Done => return Poll::Ready(None),
            }
        }
    }
}

/// `multipart/byteranges` response body, one part per span.
/// Implements [`Stream`], [`Body`], and [`IntoResponse`].
pub struct MultipartStream {
    boundary: String,
    inner: BoxStream<'static, Result<Bytes, DownloadError>>,
}

impl MultipartStream {
    pub(crate) fn new(
        source: ByteSource,
        spans: Vec<ByteSpan>,
        complete_length: u64,
        content_type: String,
        boundary: String,
        config: &DownloadConfig,
    ) -> Self {
        let config = config.clone();
        let delimiter = boundary.clone();

        let inner = async_stream::stream! {
            let mut source = source;

            for (index, span) in spans.into_iter().enumerate() {
                let line_break = if index == 0 { "" } else { "\r\n" };
                let part_headers = format!(
                    "{line_break}--{delimiter}\r\n\
                     Content-Type: {content_type}\r\n\
                     Content-Range: {}\r\n\r\n",
                    span.content_range(complete_length),
                );
                yield Ok(Bytes::from(part_headers));

                let mut part = RangedStream::new(source, span.offset, span.len(), &config);
                while let Some(chunk) = part.next().await {
                    let failed = chunk.is_err();
                    yield chunk;
                    if failed {
                        return;
                    }
                }
                source = part.into_inner();
            }

            yield Ok(Bytes::from(format!("\r\n--{delimiter}--\r\n")));
        };

        MultipartStream { boundary, inner: inner.boxed() }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }
}

impl std::fmt::Debug for MultipartStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartStream")
            .field("boundary", &self.boundary)
            .finish()
    }
}

impl IntoResponse for MultipartStream {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl Body for MultipartStream {
    type Data = Bytes;
    type Error = DownloadError;

    fn size_hint(&self) -> SizeHint {
        // part headers and boundaries make the size unknown up front
        SizeHint::default()
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
                  -> Poll<Option<Result<Frame<Bytes>, DownloadError>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl Stream for MultipartStream {
    type Item = Result<Bytes, DownloadError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>
    ) -> Poll<Option<Result<Bytes, DownloadError>>> {
        self.inner.poll_next_unpin(cx)
    }
}

//! Progress-tracking stream wrapper for object downloads.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Chunks between two progress markers when downloading
pub const DEFAULT_MARKER_EVERY: u64 = 1000;

/// Progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Another `marker_every` chunks went through
    Marker { chunks: u64, bytes: u64 },
    /// The inner stream ended
    Finished { chunks: u64, bytes: u64 },
}

/// Callback for progress updates
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Stream wrapper that counts chunks and reports every `marker_every` of them
pub struct ProgressStream<S> {
    inner: S,
    chunks: u64,
    bytes_transferred: u64,
    marker_every: u64,
    finished: bool,
    callback: ProgressCallback,
}

impl<S> ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>>,
{
    pub fn new(inner: S, marker_every: u64, callback: ProgressCallback) -> Self {
        Self {
            inner,
            chunks: 0,
            bytes_transferred: 0,
            marker_every: marker_every.max(1),
            finished: false,
            callback,
        }
    }

    /// Get total bytes transferred
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Unpin,
{
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = Pin::new(&mut self.inner);

        match inner.poll_next(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                self.chunks += 1;
                self.bytes_transferred += bytes.len() as u64;

                if self.chunks % self.marker_every == 0 {
                    (self.callback)(Progress::Marker {
                        chunks: self.chunks,
                        bytes: self.bytes_transferred,
                    });
                }

                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                if !self.finished {
                    self.finished = true;
                    (self.callback)(Progress::Finished {
                        chunks: self.chunks,
                        bytes: self.bytes_transferred,
                    });
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Prints `#` per marker and a newline at the end, like a download bar.
pub fn hash_marks() -> ProgressCallback {
    use std::io::Write;

    Arc::new(|progress| {
        let mut out = std::io::stdout().lock();
        let mark: &[u8] = match progress {
            Progress::Marker { .. } => b"#",
            Progress::Finished { .. } => b"\n",
        };
        let _ = out.write_all(mark);
        let _ = out.flush();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};
    use std::sync::Mutex;

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<Progress>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));
        (callback, seen)
    }

    #[tokio::test]
    async fn test_marker_cadence_and_trailer() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            (0..7).map(|_| Ok(Bytes::from_static(b"abc"))).collect();
        let (callback, seen) = recorder();

        let mut progress = ProgressStream::new(stream::iter(chunks), 3, callback);
        let mut total = 0;
        while let Some(chunk) = progress.next().await {
            total += chunk.unwrap().len();
        }

        assert_eq!(total, 21);
        assert_eq!(progress.bytes_transferred(), 21);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Progress::Marker { chunks: 3, bytes: 9 },
                Progress::Marker { chunks: 6, bytes: 18 },
                Progress::Finished { chunks: 7, bytes: 21 },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_stream_only_finishes() {
        let (callback, seen) = recorder();
        let mut progress = ProgressStream::new(
            stream::iter(Vec::<Result<Bytes, std::io::Error>>::new()),
            1000,
            callback,
        );

        assert!(progress.next().await.is_none());
        assert!(progress.next().await.is_none());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Progress::Finished { chunks: 0, bytes: 0 }]
        );
    }
}

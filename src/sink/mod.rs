//! Bounded fragment stream between a run and its consumer.
//!
//! The producer side ([`StreamSink`]) splits text into chunks and pushes
//! them through a bounded queue. The consumer side ([`StreamReceiver`]) reads
//! fragments until every producer is gone, or calls
//! [`StreamReceiver::disconnect`] to stop the run. After a disconnect, writes
//! are dropped without waiting for queue space.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default queue bound, in fragments.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default maximum fragment size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Create a connected sink/receiver pair.
///
/// Zero values for `capacity` or `chunk_size` are raised to 1.
pub fn channel(capacity: usize, chunk_size: usize) -> (StreamSink, StreamReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = CancellationToken::new();
    (
        StreamSink {
            tx,
            cancel: cancel.clone(),
            chunk_size: chunk_size.max(1),
        },
        StreamReceiver { rx, cancel },
    )
}

/// Split `text` into pieces of at most `size` characters.
///
/// Concatenating the pieces gives back `text`; no UTF-8 scalar is split.
pub fn chunk_text(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Producer handle. Cheap to clone; the stream ends when all clones drop.
#[derive(Debug, Clone)]
pub struct StreamSink {
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
    chunk_size: usize,
}

impl StreamSink {
    /// Queue `text` as one or more fragments.
    ///
    /// Waits for queue space. Returns `false` once the consumer has
    /// disconnected, in which case the text is discarded.
    pub async fn send(&self, text: &str) -> bool {
        for chunk in chunk_text(text, self.chunk_size) {
            if self.cancel.is_cancelled() {
                return false;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return false,
                sent = self.tx.send(chunk.to_string()) => {
                    if sent.is_err() {
                        return false;
                    }
                }
            }
        }
        !self.is_closed()
    }

    /// Token fired when the consumer disconnects.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Consumer handle.
#[derive(Debug)]
pub struct StreamReceiver {
    rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
}

impl StreamReceiver {
    /// Next fragment, or `None` once the stream is closed.
    pub async fn recv(&mut self) -> Option<String> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            fragment = self.rx.recv() => fragment,
        }
    }

    /// Stop consuming and cancel the producing run.
    ///
    /// Idempotent. Pending and future fragments are discarded.
    pub fn disconnect(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("stream consumer disconnected");
        }
        self.cancel.cancel();
        self.rx.close();
    }

    /// Handle that can disconnect from another task (e.g. a Ctrl-C handler).
    pub fn disconnect_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Adapt into a [`Stream`] of fragments.
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        futures::stream::unfold(self, |mut rx| async move {
            let fragment = rx.recv().await?;
            Some((fragment, rx))
        })
    }
}

impl Drop for StreamReceiver {
    fn drop(&mut self) {
        // A consumer that goes away is a disconnect.
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_rejoin_to_input() {
        let text = "héllo wörld, ünïcødé 🚀 text";
        for size in 1..10 {
            let chunks = chunk_text(text, size);
            assert_eq!(chunks.concat(), text);
            assert!(chunks.iter().all(|c| c.chars().count() <= size));
        }
    }

    #[test]
    fn empty_text_has_no_chunks() {
        assert!(chunk_text("", 5).is_empty());
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        assert_eq!(chunk_text("abcdef", 3), vec!["abc", "def"]);
    }

    #[tokio::test]
    async fn fragments_arrive_in_order_then_close() {
        let (sink, mut rx) = channel(4, 3);
        let producer = tokio::spawn(async move {
            assert!(sink.send("abcdefg").await);
            assert!(sink.send("h").await);
        });
        let mut received = Vec::new();
        while let Some(fragment) = rx.recv().await {
            received.push(fragment);
        }
        producer.await.unwrap();
        assert_eq!(received, vec!["abc", "def", "g", "h"]);
    }

    #[tokio::test]
    async fn writes_after_disconnect_are_discarded() {
        let (sink, mut rx) = channel(1, 10);
        assert!(sink.send("first").await);
        rx.disconnect();
        assert!(sink.cancellation_token().is_cancelled());
        // Queue is full and the consumer is gone: must not block.
        assert!(!sink.send("second").await);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_receiver_cancels_producer() {
        let (sink, rx) = channel(1, 10);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.send("lost").await);
    }
}

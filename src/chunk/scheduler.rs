use crate::message::ChatMessage;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

/// Default gap between consecutive fragment sends, in milliseconds. Most chat
/// client libraries are asynchronous and do not guarantee ordering of
/// back-to-back calls without an artificial gap.
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 300;

/// Delivery target for planned fragments, implemented by platform adapters.
/// Adapters own envelope construction and addressing.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    async fn send(&self, fragment: &ChatMessage) -> anyhow::Result<()>;
}

/// Delivers a fragment list in order: fragment 0 immediately, each subsequent
/// fragment after a fixed delay from the completion of the previous send.
/// A failed send halts the remaining fragments and propagates the error;
/// later fragments continue the narrative of earlier ones, so sending them
/// after a gap in the sequence would be worse than stopping.
pub struct ChunkScheduler {
    delay: Duration,
}

impl ChunkScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn with_delay_ms(delay_ms: u64) -> Self {
        Self::new(Duration::from_millis(delay_ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Send every fragment to `sink` in order. Returns the number delivered.
    pub async fn deliver<S>(&self, fragments: &[ChatMessage], sink: &S) -> anyhow::Result<usize>
    where
        S: ChunkSink + ?Sized,
    {
        for (i, fragment) in fragments.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.delay).await;
            }
            sink.send(fragment).await.with_context(|| {
                format!(
                    "fragment {}/{} failed; halting remaining sends",
                    i + 1,
                    fragments.len()
                )
            })?;
        }
        Ok(fragments.len())
    }
}

impl Default for ChunkScheduler {
    fn default() -> Self {
        Self::with_delay_ms(DEFAULT_CHUNK_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail_on: Option<usize>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(index: usize) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_on: Some(index),
            }
        }
    }

    #[async_trait]
    impl ChunkSink for RecordingSink {
        async fn send(&self, fragment: &ChatMessage) -> anyhow::Result<()> {
            let mut sent = self.sent.lock();
            if self.fail_on == Some(sent.len()) {
                anyhow::bail!("sink rejected fragment");
            }
            sent.push(fragment.text.clone().unwrap_or_default());
            Ok(())
        }
    }

    fn fragments(texts: &[&str]) -> Vec<ChatMessage> {
        texts.iter().map(|t| ChatMessage::from_text(*t)).collect()
    }

    #[tokio::test]
    async fn delivers_in_order() {
        let sink = RecordingSink::new();
        let scheduler = ChunkScheduler::with_delay_ms(0);

        let sent = scheduler
            .deliver(&fragments(&["one", "two", "three"]), &sink)
            .await
            .unwrap();

        assert_eq!(sent, 3);
        assert_eq!(*sink.sent.lock(), vec!["one", "two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_the_configured_delay_between_sends() {
        let sink = RecordingSink::new();
        let scheduler = ChunkScheduler::default();

        let start = tokio::time::Instant::now();
        scheduler
            .deliver(&fragments(&["a", "b", "c"]), &sink)
            .await
            .unwrap();

        // Two gaps of 300ms; the first fragment goes out immediately.
        assert_eq!(start.elapsed(), Duration::from_millis(600));
    }

    #[tokio::test]
    async fn failure_halts_remaining_fragments() {
        let sink = RecordingSink::failing_on(1);
        let scheduler = ChunkScheduler::with_delay_ms(0);

        let err = scheduler
            .deliver(&fragments(&["a", "b", "c"]), &sink)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("halting remaining sends"));
        assert_eq!(*sink.sent.lock(), vec!["a"]);
    }

    #[tokio::test]
    async fn empty_fragment_list_is_a_noop() {
        let sink = RecordingSink::new();
        let sent = ChunkScheduler::default().deliver(&[], &sink).await.unwrap();
        assert_eq!(sent, 0);
        assert!(sink.sent.lock().is_empty());
    }
}

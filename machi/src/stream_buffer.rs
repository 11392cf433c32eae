//! Stream buffer — a bounded, single-consumer FIFO of [`Event`]s.
//!
//! The Model adapter's producer task pushes events with [`StreamBuffer::emit`]
//! as they are normalised off the wire; the Runner's streaming consumer pulls
//! them with [`StreamBuffer::next`]. [`StreamBuffer::complete`] marks the
//! buffer closed: once drained, subsequent `next` calls return
//! [`NextEvent::Done`] rather than blocking forever.
//!
//! Grounded on the teacher's channel-based streaming plumbing
//! (`tokio::sync::mpsc`), generalised here to an explicit three-state poll
//! result (`Event` / `Done` / timed-out) instead of an `Option`, since the
//! Runner needs to distinguish "closed" from "nothing yet, but still open".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::event::Event;

/// Outcome of polling the buffer for the next event.
#[derive(Debug)]
pub enum NextEvent {
    /// An event was available.
    Event(Event),
    /// The producer called [`StreamBuffer::complete`] and the buffer is
    /// now drained.
    Done,
    /// No event arrived within the requested timeout; the buffer is still
    /// open and a later `next` call may still succeed.
    TimedOut,
}

/// The producer half: push normalised events, then signal completion.
#[derive(Clone)]
pub struct StreamProducer {
    sender: mpsc::UnboundedSender<Event>,
    closed: Arc<AtomicBool>,
}

impl StreamProducer {
    /// Push an event to the consumer. A no-op if the buffer is already
    /// marked complete or the consumer has been dropped.
    pub fn emit(&self, event: Event) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.sender.send(event);
    }

    /// Mark the stream complete. Events already queued are still
    /// delivered; no further `emit` calls take effect.
    pub fn complete(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// The consumer half: pull events in order until [`NextEvent::Done`].
pub struct StreamConsumer {
    receiver: mpsc::UnboundedReceiver<Event>,
    closed: Arc<AtomicBool>,
}

impl StreamConsumer {
    /// Wait up to `timeout` for the next event.
    pub async fn next(&mut self, timeout: Duration) -> NextEvent {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(event)) => NextEvent::Event(event),
            Ok(None) => NextEvent::Done,
            Err(_elapsed) => {
                if self.closed.load(Ordering::Acquire) {
                    match self.receiver.try_recv() {
                        Ok(event) => NextEvent::Event(event),
                        Err(_) => NextEvent::Done,
                    }
                } else {
                    NextEvent::TimedOut
                }
            }
        }
    }
}

/// Create a linked producer/consumer pair for one streaming run.
#[must_use]
pub fn channel() -> (StreamProducer, StreamConsumer) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        StreamProducer {
            sender,
            closed: closed.clone(),
        },
        StreamConsumer { receiver, closed },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_delivered_in_order() {
        let (producer, mut consumer) = channel();
        producer.emit(Event::TextDelta { text: "a".into(), index: 0 });
        producer.emit(Event::TextDelta { text: "b".into(), index: 1 });
        producer.complete();

        let first = consumer.next(Duration::from_millis(100)).await;
        let second = consumer.next(Duration::from_millis(100)).await;
        let third = consumer.next(Duration::from_millis(100)).await;

        assert!(matches!(first, NextEvent::Event(Event::TextDelta { .. })));
        assert!(matches!(second, NextEvent::Event(Event::TextDelta { .. })));
        assert!(matches!(third, NextEvent::Done));
    }

    #[tokio::test]
    async fn next_times_out_while_still_open() {
        let (_producer, mut consumer) = channel();
        let result = consumer.next(Duration::from_millis(10)).await;
        assert!(matches!(result, NextEvent::TimedOut));
    }

    #[tokio::test]
    async fn emit_after_complete_is_ignored() {
        let (producer, mut consumer) = channel();
        producer.complete();
        producer.emit(Event::StreamComplete);
        let result = consumer.next(Duration::from_millis(50)).await;
        assert!(matches!(result, NextEvent::Done));
    }
}

//! Event handoff from the scan engine to whoever renders it.
//!
//! Unbounded and FIFO. The engine never blocks on send; the consumer drains
//! whatever is queued on its own tick.

use std::sync::mpsc::{self, Receiver, Sender};

/// Notification emitted by the scan engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Status(String),
    ClickCount(u64),
}

impl Event {
    pub fn status(text: impl Into<String>) -> Self {
        Event::Status(text.into())
    }

    pub fn click_count(count: u64) -> Self {
        Event::ClickCount(count)
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Event>,
}

impl EventSender {
    /// Queue an event. A consumer that has gone away is not an error; the
    /// engine keeps scanning headless.
    pub fn send(&self, event: Event) {
        self.tx.send(event).ok();
    }
}

#[derive(Debug)]
pub struct EventReceiver {
    rx: Receiver<Event>,
}

impl EventReceiver {
    /// Everything queued right now, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Latest value of each signal, folded from the event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub status: Option<String>,
    pub click_count: u64,
}

impl Snapshot {
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Status(text) => self.status = Some(text.clone()),
            Event::ClickCount(n) => self.click_count = *n,
        }
    }

    pub fn apply_all<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) {
        for e in events {
            self.apply(e);
        }
    }

    pub fn counter_text(&self) -> String {
        format!("{:06}", self.click_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_and_empties_queue() {
        let (tx, rx) = event_channel();
        tx.send(Event::status("a"));
        tx.send(Event::click_count(1));
        tx.send(Event::status("b"));

        assert_eq!(
            rx.drain(),
            vec![Event::status("a"), Event::click_count(1), Event::status("b")]
        );
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn send_after_receiver_dropped_is_silent() {
        let (tx, rx) = event_channel();
        drop(rx);
        tx.send(Event::status("nobody listening"));
    }

    #[test]
    fn producer_on_another_thread() {
        let (tx, rx) = event_channel();
        let h = std::thread::spawn(move || {
            for i in 0..100 {
                tx.send(Event::click_count(i));
            }
        });
        h.join().unwrap();
        let got: Vec<_> = rx.drain();
        assert_eq!(got.len(), 100);
        assert_eq!(got[99], Event::click_count(99));
    }

    #[test]
    fn snapshot_keeps_last_value_of_each_signal() {
        let mut s = Snapshot::default();
        s.apply_all(&[
            Event::status("first"),
            Event::click_count(3),
            Event::status("second"),
            Event::click_count(4),
        ]);
        assert_eq!(s.status.as_deref(), Some("second"));
        assert_eq!(s.click_count, 4);
        assert_eq!(s.counter_text(), "000004");

        // re-applying is harmless
        s.apply(&Event::click_count(4));
        assert_eq!(s.counter_text(), "000004");
    }
}

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Notifications for whoever embeds the player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    MetadataReady {
        width: u32,
        height: u32,
        frame_rate: f64,
    },
    Progress {
        position: Duration,
        duration: Option<Duration>,
    },
    /// The decoder ran out of input (or failed mid-stream).
    EndOfStream,
    SinkError(String),
}

/// Non-blocking fan-out for player events. Every subscriber gets its own
/// bounded backlog; a subscriber that falls behind loses its oldest events.
/// Events emitted before a subscription are not replayed to it.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

struct Subscriber {
    sender: Sender<PlayerEvent>,
    /// Used to discard the oldest event when the backlog is full.
    overflow: Receiver<PlayerEvent>,
    alive: Weak<()>,
}

const EVENT_BACKLOG: usize = 256;

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| s.alive.strong_count() > 0);
        for subscriber in subscribers.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    let _ = subscriber.overflow.try_recv();
                    let _ = subscriber.sender.try_send(event);
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        let (sender, receiver) = crossbeam_channel::bounded(EVENT_BACKLOG);
        let alive = Arc::new(());
        self.subscribers.lock().push(Subscriber {
            sender,
            overflow: receiver.clone(),
            alive: Arc::downgrade(&alive),
        });
        EventReceiver { receiver, _alive: alive }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|s| s.alive.strong_count() > 0);
        subscribers.len()
    }
}

/// One subscriber's view of the bus. Dropping every clone unsubscribes.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<PlayerEvent>,
    _alive: Arc<()>,
}

impl Deref for EventReceiver {
    type Target = Receiver<PlayerEvent>;

    fn deref(&self) -> &Self::Target {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_sees_events_in_order() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        bus.emit(PlayerEvent::EndOfStream);
        bus.emit(PlayerEvent::SinkError("boom".to_string()));
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::EndOfStream);
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::SinkError("boom".to_string()));
    }

    #[test]
    fn test_full_backlog_keeps_newest() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        for i in 0..(EVENT_BACKLOG as u64 + 10) {
            bus.emit(PlayerEvent::Progress {
                position: Duration::from_secs(i),
                duration: None,
            });
        }
        let events: Vec<PlayerEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), EVENT_BACKLOG);
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Progress {
                position: Duration::from_secs(EVENT_BACKLOG as u64 + 9),
                duration: None,
            })
        );
    }

    #[test]
    fn test_every_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let ui = bus.subscribe();
        let log = bus.subscribe();
        bus.emit(PlayerEvent::EndOfStream);

        assert_eq!(ui.try_recv().unwrap(), PlayerEvent::EndOfStream);
        assert_eq!(log.try_recv().unwrap(), PlayerEvent::EndOfStream);
        assert!(ui.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_forgotten() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        let gone = bus.subscribe();
        let gone_clone = gone.clone();
        drop(gone);
        assert_eq!(bus.subscriber_count(), 2);

        drop(gone_clone);
        bus.emit(PlayerEvent::EndOfStream);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.try_recv().unwrap(), PlayerEvent::EndOfStream);
    }
}

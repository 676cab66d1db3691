//! Event bus (C6): event-mask subscription, publish to user callbacks.
//!
//! Unregistration during dispatch is deferred (tombstone + sweep) so a
//! callback that unsubscribes itself, or another callback, never
//! invalidates the iteration in progress.

use bitflags::bitflags;

use crate::ubx::messages::NavPvt;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EventMask: u32 {
        const STATE_CHANGE          = 1 << 0;
        const TARGET_STATE_REACHED  = 1 << 1;
        const TARGET_STATE_TIMEOUT  = 1 << 2;
        const LOCATION              = 1 << 3;
        const NMEA_LINE             = 1 << 4;
        const AID_REQ               = 1 << 5;
    }
}

#[derive(Debug, Clone)]
pub enum GpsEvent {
    StateChange { state: crate::state_machine::GpsState },
    TargetStateReached { state: crate::state_machine::GpsState },
    TargetStateTimeout,
    Location(NavPvt),
    NmeaLine(String),
    AidRequest,
}

impl GpsEvent {
    fn mask(&self) -> EventMask {
        match self {
            GpsEvent::StateChange { .. } => EventMask::STATE_CHANGE,
            GpsEvent::TargetStateReached { .. } => EventMask::TARGET_STATE_REACHED,
            GpsEvent::TargetStateTimeout => EventMask::TARGET_STATE_TIMEOUT,
            GpsEvent::Location(_) => EventMask::LOCATION,
            GpsEvent::NmeaLine(_) => EventMask::NMEA_LINE,
            GpsEvent::AidRequest => EventMask::AID_REQ,
        }
    }
}

pub type Callback = Box<dyn FnMut(&GpsEvent) + Send>;

struct Subscriber {
    mask: EventMask,
    callback: Callback,
    tombstoned: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(u64);

/// Registry of event subscribers with deferred-unregister semantics.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<(SubscriberId, Subscriber)>,
    next_id: u64,
    publishing_depth: u32,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            subscribers: Vec::new(),
            next_id: 0,
            publishing_depth: 0,
        }
    }

    pub fn register(&mut self, mask: EventMask, callback: Callback) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((
            id,
            Subscriber {
                mask,
                callback,
                tombstoned: false,
            },
        ));
        id
    }

    /// Mark a subscriber for removal. If a publish is in progress the
    /// entry is only tombstoned; it is swept once the outermost publish
    /// unwinds.
    pub fn unregister(&mut self, id: SubscriberId) {
        if let Some((_, sub)) = self.subscribers.iter_mut().find(|(sid, _)| *sid == id) {
            sub.tombstoned = true;
        }
        if self.publishing_depth == 0 {
            self.sweep();
        }
    }

    fn sweep(&mut self) {
        self.subscribers.retain(|(_, sub)| !sub.tombstoned);
    }

    /// Deliver `event` to every non-tombstoned subscriber whose mask
    /// intersects the event's kind, in registration order.
    pub fn publish(&mut self, event: &GpsEvent) {
        self.publishing_depth += 1;
        let event_mask = event.mask();
        for (_, sub) in self.subscribers.iter_mut() {
            if sub.tombstoned || !sub.mask.intersects(event_mask) {
                continue;
            }
            (sub.callback)(event);
        }
        self.publishing_depth -= 1;
        if self.publishing_depth == 0 {
            self.sweep();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|(_, s)| !s.tombstoned).count()
    }
}

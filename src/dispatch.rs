//! UBX dispatcher (C5): per-(class, id) pending-request table with
//! timeout-tracked exchanges, ACK/NAK correlation, and broadcast handlers
//! for unsolicited messages (NAV-PVT, AID-ALPSRV) that are delivered
//! regardless of outstanding requests.

use std::time::{Duration, Instant};

use crate::ubx::messages::{AckAck, AckNak, UbxMessage};
use crate::ubx::UbxFrame;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

#[derive(Clone, Copy, PartialEq, Eq)]
enum WaitKind {
    /// Waiting for ACK-ACK/ACK-NAK whose payload names (class, id).
    Ack,
    /// Waiting for an inbound message with this exact (class, id).
    Message,
}

struct Waiter {
    id: WaiterId,
    class: u8,
    msg_id: u8,
    kind: WaitKind,
    deadline: Instant,
}

/// What a waiter resolved to.
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Ack,
    Nak,
    Message(UbxFrame),
    Timeout,
}

type BroadcastHandler = Box<dyn FnMut(&UbxFrame) + Send>;

#[derive(Default)]
pub struct Dispatcher {
    pending: Vec<Waiter>,
    broadcasts: Vec<(u8, u8, BroadcastHandler)>,
    next_id: u64,
}

impl Dispatcher {
    pub fn new() -> Self {
        Dispatcher {
            pending: Vec::new(),
            broadcasts: Vec::new(),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> WaiterId {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a waiter for the ACK-ACK/ACK-NAK that correlates to a
    /// message of class/id just sent.
    pub fn wait_for_ack(&mut self, class: u8, msg_id: u8, now: Instant, timeout: Duration) -> WaiterId {
        let id = self.alloc_id();
        self.pending.push(Waiter {
            id,
            class,
            msg_id,
            kind: WaitKind::Ack,
            deadline: now + timeout,
        });
        id
    }

    /// Register a waiter for an inbound message of the given class/id
    /// (used for polls like MON-VER, AID-ALP).
    pub fn wait_for_message(&mut self, class: u8, msg_id: u8, now: Instant, timeout: Duration) -> WaiterId {
        let id = self.alloc_id();
        self.pending.push(Waiter {
            id,
            class,
            msg_id,
            kind: WaitKind::Message,
            deadline: now + timeout,
        });
        id
    }

    /// Register a standing handler for unsolicited messages of this
    /// class/id, invoked on every matching frame regardless of whether any
    /// waiter is pending.
    pub fn on_broadcast(&mut self, class: u8, msg_id: u8, handler: BroadcastHandler) {
        self.broadcasts.push((class, msg_id, handler));
    }

    /// Feed an inbound frame. Delivers to the first FIFO-matching waiter
    /// (if any) and to every broadcast handler registered for this
    /// class/id.
    pub fn on_frame(&mut self, frame: &UbxFrame) -> Vec<(WaiterId, DispatchOutcome)> {
        let mut delivered = Vec::new();

        if frame.class == AckAck::CLASS && frame.id == AckAck::ID {
            if let Ok(ack) = AckAck::from_payload(&frame.payload) {
                if let Some(pos) = self
                    .pending
                    .iter()
                    .position(|w| w.kind == WaitKind::Ack && w.class == ack.class && w.msg_id == ack.id)
                {
                    let waiter = self.pending.remove(pos);
                    delivered.push((waiter.id, DispatchOutcome::Ack));
                }
            }
        } else if frame.class == AckNak::CLASS && frame.id == AckNak::ID {
            if let Ok(nak) = AckNak::from_payload(&frame.payload) {
                if let Some(pos) = self
                    .pending
                    .iter()
                    .position(|w| w.kind == WaitKind::Ack && w.class == nak.class && w.msg_id == nak.id)
                {
                    let waiter = self.pending.remove(pos);
                    delivered.push((waiter.id, DispatchOutcome::Nak));
                }
            }
        } else if let Some(pos) = self
            .pending
            .iter()
            .position(|w| w.kind == WaitKind::Message && w.class == frame.class && w.msg_id == frame.id)
        {
            let waiter = self.pending.remove(pos);
            delivered.push((waiter.id, DispatchOutcome::Message(frame.clone())));
        }

        for (class, msg_id, handler) in self.broadcasts.iter_mut() {
            if *class == frame.class && *msg_id == frame.id {
                handler(frame);
            }
        }

        delivered
    }

    /// Pop every waiter whose deadline has passed, delivering `Timeout`.
    pub fn tick(&mut self, now: Instant) -> Vec<(WaiterId, DispatchOutcome)> {
        let mut fired = Vec::new();
        self.pending.retain(|w| {
            if w.deadline <= now {
                fired.push((w.id, DispatchOutcome::Timeout));
                false
            } else {
                true
            }
        });
        fired
    }

    pub fn cancel(&mut self, id: WaiterId) {
        self.pending.retain(|w| w.id != id);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

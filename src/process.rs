//! Module that contains the state machine each process runs to share the resource.
//!
//! A process only touches its own state. Every operation returns the
//! [`Effects`] it produced: the messages to hand to the transport and whether
//! the state changed, so the caller decides how to deliver and whom to notify.

use crate::{
    clock::{LamportClock, Timestamp},
    error::ProtocolError,
    message::{Kind, Message, ProcessId, RequestKey, Sequencer},
    observer::WatchMessage,
    queue::EventQueue,
    transport::Envelope,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};

/// Enum that tells where a process is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessState {
    Free,
    Requested,
    Holding,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Free => "Free",
            Self::Requested => "Requested",
            Self::Holding => "Holding",
        };
        f.write_str(name)
    }
}

/// What an operation asks the caller to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Effects {
    pub outgoing: Vec<Envelope>,
    /// The process just entered `Holding`; its usage timer must start.
    pub acquired: bool,
    pub state_changed: bool,
}

impl Effects {
    fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone)]
pub struct Process {
    id: ProcessId,
    members: BTreeSet<ProcessId>,
    clock: LamportClock,
    sequencer: Sequencer,
    queue: EventQueue,
    acks: BTreeSet<ProcessId>,
    state: ProcessState,
    outstanding: Option<Message>,
    hold: Option<Message>,
}

impl Process {
    /// Function that creates a free process. `members` lists every process in the directory.
    pub fn new(id: ProcessId, members: impl IntoIterator<Item = ProcessId>) -> Self {
        let mut members: BTreeSet<ProcessId> = members.into_iter().collect();
        members.insert(id);

        Self {
            id,
            members,
            clock: LamportClock::new(),
            sequencer: Sequencer::new(),
            queue: EventQueue::new(),
            acks: BTreeSet::new(),
            state: ProcessState::Free,
            outstanding: None,
            hold: None,
        }
    }

    /// Function that seeds the queue with the request `(holder, 0)`. The holder starts in `Holding`.
    pub fn with_bootstrap(mut self, holder: ProcessId) -> Self {
        let seed = Message {
            origin: holder,
            seq: 0,
            time: 0,
            kind: Kind::Request,
        };
        self.queue.push(seed.clone());

        if holder == self.id {
            self.state = ProcessState::Holding;
            self.hold = Some(seed);
        }
        self
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn time(&self) -> Timestamp {
        self.clock.time()
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn acks(&self) -> &BTreeSet<ProcessId> {
        &self.acks
    }

    /// Number of acknowledgments a request needs: every other member.
    pub fn quorum(&self) -> usize {
        self.members.len() - 1
    }

    pub fn snapshot(&self) -> WatchMessage {
        WatchMessage {
            process: self.id,
            clock: self.clock.to_string(),
            state: self.state,
            queue_len: self.queue.len(),
        }
    }

    /// Function that advances the clock for activity unrelated to the resource.
    pub fn internal_event(&mut self) -> Timestamp {
        self.clock.tick()
    }

    /// Function that asks for the resource. Does nothing unless the process is free.
    pub fn request(&mut self) -> Effects {
        if self.state != ProcessState::Free {
            return Effects::none();
        }

        let time = self.clock.tick();
        let request = self.sequencer.stamp(self.id, time, Kind::Request);

        self.queue.push(request.clone());
        self.outstanding = Some(request.clone());
        self.acks.clear();
        self.state = ProcessState::Requested;

        Effects {
            outgoing: vec![Envelope::broadcast(request)],
            acquired: self.try_acquire(),
            state_changed: true,
        }
    }

    /// Function that handles a message delivered by a peer.
    pub fn receive(&mut self, message: Message) -> Result<Effects, ProtocolError> {
        if message.origin == self.id {
            return Err(ProtocolError::Loopback { process: self.id });
        }
        if !self.members.contains(&message.origin) {
            return Err(ProtocolError::UnknownOrigin {
                process: self.id,
                origin: message.origin,
            });
        }

        self.clock.witness(message.time);

        let mut effects = Effects::none();
        match message.kind {
            Kind::Request => {
                let ack = self.sequencer.stamp(self.id, self.clock.time(), Kind::Ack);
                effects.outgoing.push(Envelope::to(message.origin, ack));
                self.queue.push(message);
            }
            Kind::Ack => {
                self.acks.insert(message.origin);
            }
            Kind::Release(key) => {
                self.queue.remove_where(|m| m.is_request() && m.key() == key);
            }
            Kind::Internal => {
                return Err(ProtocolError::UnexpectedKind {
                    process: self.id,
                    kind: message.kind.name(),
                });
            }
        }

        effects.acquired = self.try_acquire();
        effects.state_changed = effects.acquired;
        Ok(effects)
    }

    /// Function that gives the resource back and tells every peer about it.
    pub fn release(&mut self) -> Result<Effects, ProtocolError> {
        let held = match (self.state, self.hold.take()) {
            (ProcessState::Holding, Some(held)) => held,
            (state, hold) => {
                self.hold = hold;
                return Err(ProtocolError::ReleaseWithoutHold {
                    process: self.id,
                    state,
                });
            }
        };

        let time = self.clock.tick();
        let key = held.key();
        self.queue.remove_where(|m| m.is_request() && m.key() == key);
        self.state = ProcessState::Free;

        let release = self.sequencer.stamp(self.id, time, Kind::Release(key));
        Ok(Effects {
            outgoing: vec![Envelope::broadcast(release)],
            acquired: false,
            state_changed: true,
        })
    }

    /// Function that tells whether the outstanding request may be granted right now.
    ///
    /// It has to be the lowest-ranked request in the queue, and every other
    /// member has to have acknowledged it, since a lower-ranked request could
    /// still be on its way from a peer that has not answered yet.
    pub fn can_acquire(&self) -> bool {
        let Some(outstanding) = &self.outstanding else {
            return false;
        };
        if self.state != ProcessState::Requested {
            return false;
        }

        let first = self.queue.peek_min().map(Message::key);
        first == Some(outstanding.key()) && self.acks.len() == self.quorum()
    }

    fn try_acquire(&mut self) -> bool {
        if !self.can_acquire() {
            return false;
        }

        let granted = self.queue.pop_min();
        debug_assert_eq!(
            granted.as_ref().map(Message::key),
            self.outstanding.as_ref().map(Message::key)
        );

        self.hold = self.outstanding.take();
        self.acks.clear();
        self.state = ProcessState::Holding;
        true
    }

    /// Key of the request currently being served, if this process is the holder.
    pub fn held_key(&self) -> Option<RequestKey> {
        self.hold.as_ref().map(Message::key)
    }
}

//! Module that moves messages between processes.
//!
//! Every process owns an [`Outbox`]. A [`Courier`] task drains it one
//! envelope at a time, waits a jittered delay and then pushes the message into
//! the recipients' inboxes. Draining sequentially keeps delivery FIFO between
//! any two processes, while the event loop never waits on a full inbox.
//!
//! The outbox itself is unbounded. What it can hold is bounded by the protocol
//! instead: a process has at most one request outstanding, so it queues at most
//! that request and its release, plus one ack per peer, since a peer cannot
//! request again before our ack for its previous request has been delivered.

use crate::{
    error::TransportError,
    jitter::{Jitter, JitterSpec},
    log,
    message::{Message, ProcessId},
};
use color_print::cformat;
use rand::rngs::SmallRng;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::mpsc::{self, Receiver, Sender, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Every process in the directory except the origin of the message.
    Peers,
    One(ProcessId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub to: Recipients,
    pub message: Message,
}

impl Envelope {
    pub fn broadcast(message: Message) -> Self {
        Self {
            to: Recipients::Peers,
            message,
        }
    }

    pub fn to(recipient: ProcessId, message: Message) -> Self {
        Self {
            to: Recipients::One(recipient),
            message,
        }
    }
}

/// Static routing table from process identity to its inbox. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    inboxes: BTreeMap<ProcessId, Sender<Message>>,
}

impl Directory {
    /// Function that creates `processes` inboxes and returns the directory with their receiving ends.
    pub fn build(processes: u32, capacity: usize) -> (Self, Vec<(ProcessId, Receiver<Message>)>) {
        let mut directory = Self::default();
        let mut inboxes = Vec::with_capacity(processes as usize);

        for id in (0..processes).map(ProcessId) {
            let (tx, rx) = mpsc::channel::<Message>(capacity);
            directory.push(id, tx);
            inboxes.push((id, rx));
        }
        (directory, inboxes)
    }

    pub fn push(&mut self, id: ProcessId, inbox: Sender<Message>) {
        self.inboxes.insert(id, inbox);
    }

    pub fn get(&self, id: ProcessId) -> Option<&Sender<Message>> {
        self.inboxes.get(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.inboxes.keys().copied()
    }

    /// Function that puts a message in one inbox, waiting while the inbox is full.
    pub async fn send(&self, to: ProcessId, message: Message) -> Result<(), TransportError> {
        let inbox = self.get(to).ok_or(TransportError::UnknownRecipient(to))?;
        inbox
            .send(message)
            .await
            .map_err(|_| TransportError::Closed(to))
    }

    /// Function that puts a message in the inbox of every process except its origin.
    ///
    /// Keeps going past closed inboxes and returns the first failure.
    pub async fn broadcast(&self, message: &Message) -> Result<(), TransportError> {
        let mut result = Ok(());
        for (id, inbox) in &self.inboxes {
            if *id == message.origin {
                continue;
            }
            if inbox.send(message.clone()).await.is_err() && result.is_ok() {
                result = Err(TransportError::Closed(*id));
            }
        }
        result
    }

    pub async fn deliver(&self, envelope: Envelope) -> Result<(), TransportError> {
        match envelope.to {
            Recipients::Peers => self.broadcast(&envelope.message).await,
            Recipients::One(to) => self.send(to, envelope.message).await,
        }
    }
}

/// Sending half handed to a process' event loop. Never blocks.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: UnboundedSender<Envelope>,
}

impl Outbox {
    pub fn post(&self, envelope: Envelope) -> Result<(), TransportError> {
        let from = envelope.message.origin;
        self.tx
            .send(envelope)
            .map_err(|_| TransportError::Closed(from))
    }
}

pub struct Courier {
    pub from: ProcessId,
    pub directory: Arc<Directory>,
    pub delay: JitterSpec,
    queue: UnboundedReceiver<Envelope>,
    jitter: Jitter<SmallRng>,
}

impl Courier {
    /// Function that creates a courier for `from` and the outbox that feeds it.
    pub fn new(
        from: ProcessId,
        directory: Arc<Directory>,
        delay: JitterSpec,
        seed: u64,
    ) -> (Self, Outbox) {
        let (tx, queue) = mpsc::unbounded_channel::<Envelope>();

        (
            Self {
                from,
                directory,
                delay,
                queue,
                jitter: Jitter::new(seed),
            },
            Outbox { tx },
        )
    }

    /// Function that delivers envelopes until the outbox is dropped or the simulation shuts down.
    ///
    /// Envelopes still waiting when shutdown starts are dropped, as are
    /// deliveries to inboxes that already closed.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            let envelope = tokio::select! {
                _ = shutdown.cancelled() => break,
                envelope = self.queue.recv() => match envelope {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let delay = self.jitter.duration(self.delay);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            let description = envelope.message.to_string();
            if let Err(e) = self.directory.deliver(envelope).await {
                if shutdown.is_cancelled() {
                    log::debug(&format!("{}: dropped {description} during shutdown ({e}).", self.from));
                } else {
                    log::warn(&cformat!("<bold>{}</bold> could not deliver {description}: {e}", self.from));
                }
            }
        }
    }
}

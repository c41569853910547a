use crate::*;
use color_print::cformat;
use rand::rngs::SmallRng;
use std::pin::Pin;
use tokio::{
    sync::mpsc::Receiver,
    time::{self, Instant, MissedTickBehavior, Sleep},
};
use tokio_util::sync::CancellationToken;

/// Timer settings that drive a process when nothing else happens.
#[derive(Debug, Clone, Copy)]
pub struct Workload {
    pub request_interval: std::time::Duration,
    pub request_probability: f64,
    pub internal_event: JitterSpec,
    pub usage: JitterSpec,
    pub initial_usage: JitterSpec,
}

impl From<&SimConfig> for Workload {
    fn from(config: &SimConfig) -> Self {
        Self {
            request_interval: config.request_interval(),
            request_probability: config.request_probability,
            internal_event: config.internal_event,
            usage: config.usage,
            initial_usage: config.initial_usage,
        }
    }
}

type UsageTimer = Option<Pin<Box<Sleep>>>;

/// One process of the simulation together with its inbox, outbox and timers.
pub struct Peer {
    pub process: Process,
    inbox: Receiver<Message>,
    outbox: Outbox,
    watch: ProcessWatch,
    workload: Workload,
    jitter: Jitter<SmallRng>,
}

impl Peer {
    pub fn new(
        process: Process,
        inbox: Receiver<Message>,
        outbox: Outbox,
        watch: ProcessWatch,
        workload: Workload,
        seed: u64,
    ) -> Self {
        Self {
            process,
            inbox,
            outbox,
            watch,
            workload,
            jitter: Jitter::new(seed),
        }
    }

    /// Function that runs the event loop until shutdown or a protocol violation.
    ///
    /// Each iteration handles exactly one of: an inbound message, the request
    /// timer, the internal-event timer, the usage timer, or shutdown.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), ProtocolError> {
        let id = self.process.id();

        let period = self.workload.request_interval;
        let mut request_ticker = time::interval_at(deadline(period), period);
        request_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let internal = time::sleep(self.jitter.duration(self.workload.internal_event));
        tokio::pin!(internal);

        let mut usage: UsageTimer = None;
        if self.process.state() == ProcessState::Holding {
            let duration = self.jitter.duration(self.workload.initial_usage);
            usage = Some(Box::pin(time::sleep(duration)));
            log::info(&cformat!("<bold>{id}</bold> starts out <yellow, bold>holding</yellow, bold> the resource."));
        }
        self.watch.publish(self.process.snapshot()).await;

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),
                message = self.inbox.recv() => match message {
                    Some(message) => {
                        if let Err(e) = self.on_message(message, &mut usage).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                },
                _ = request_ticker.tick() => {
                    if self.jitter.chance(self.workload.request_probability) {
                        let effects = self.process.request();
                        if effects.state_changed {
                            log::debug(&cformat!("<bold>{id}</bold> requests the resource at t={}.", self.process.time()));
                        }
                        self.apply(effects, &mut usage).await;
                    }
                }
                () = &mut internal => {
                    let next = self.jitter.duration(self.workload.internal_event);
                    internal.as_mut().reset(deadline(next));
                    self.process.internal_event();
                }
                () = expire(&mut usage) => {
                    usage = None;
                    if let Err(e) = self.on_usage_expired(&mut usage).await {
                        break Err(e);
                    }
                }
            }
        };

        // timers drop with this frame
        self.inbox.close();
        match &result {
            Ok(()) => log::debug(&format!("{id} shut down at t={}.", self.process.time())),
            Err(e) => log::error(&format!("{e}")),
        }
        result
    }

    async fn on_message(
        &mut self,
        message: Message,
        usage: &mut UsageTimer,
    ) -> Result<(), ProtocolError> {
        log::debug(&cformat!(
            "<bold>{}</bold> received {message}.",
            self.process.id()
        ));
        let effects = self.process.receive(message)?;
        self.apply(effects, usage).await;
        Ok(())
    }

    async fn on_usage_expired(&mut self, usage: &mut UsageTimer) -> Result<(), ProtocolError> {
        let held = self.process.held_key();
        let effects = self.process.release()?;
        if let Some(key) = held {
            log::info(&cformat!(
                "<bold>{}</bold> released the resource granted for ({}, t={}).",
                self.process.id(),
                key.origin,
                key.time
            ));
        }
        self.apply(effects, usage).await;
        Ok(())
    }

    /// Function that publishes a state change before handing outgoing messages to the courier,
    /// so the observer never learns about a transition after a peer reacted to it.
    async fn apply(&mut self, effects: Effects, usage: &mut UsageTimer) {
        if effects.acquired {
            let duration = self.jitter.duration(self.workload.usage);
            *usage = Some(Box::pin(time::sleep(duration)));
            log::info(&cformat!(
                "<bold>{}</bold> is <yellow, bold>holding</yellow, bold> the resource at t={} for {}ms.",
                self.process.id(),
                self.process.time(),
                duration.as_millis()
            ));
        }
        if effects.state_changed {
            self.watch.publish(self.process.snapshot()).await;
        }
        for envelope in effects.outgoing {
            if let Err(e) = self.outbox.post(envelope) {
                log::warn(&format!("{e}"));
            }
        }
    }
}

/// About thirty years; what tokio itself treats as "never".
const FAR_FUTURE: std::time::Duration = std::time::Duration::from_secs(86400 * 365 * 30);

/// Function that returns `now + after` without overflowing on huge jittered durations.
fn deadline(after: std::time::Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or(now + FAR_FUTURE)
}

async fn expire(timer: &mut UsageTimer) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn deadline_caps_durations_that_overflow_the_clock() {
        let now = Instant::now();
        assert_eq!(deadline(Duration::from_millis(5)), now + Duration::from_millis(5));
        assert_eq!(deadline(Duration::MAX), now + FAR_FUTURE);
    }
}

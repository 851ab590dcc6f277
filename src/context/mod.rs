//! The client context
//!
//! A [`Context`] owns the channel service, the notification queue, every
//! channel and every registered observer. At most one is active per
//! process. The thread that created it calls [`Context::poll`] periodically;
//! that call drains the queue and runs all state transitions and observer
//! callbacks on the calling thread.
//!
//! ```rust
//! use pvlink::context::Context;
//! use pvlink::core::config::ClientConfig;
//! use pvlink::service::{SimVariable, SimulatedService};
//! use pvlink::types::FieldType;
//!
//! let (service, control) = SimulatedService::new();
//! control.define(
//!     "DEMO:TEMP",
//!     SimVariable::new(FieldType::Double, 1).with_values(21.5f64.to_ne_bytes().to_vec()),
//! );
//!
//! let mut cx = Context::initialise(ClientConfig::default(), service).unwrap();
//! let temp = cx.create_channel("DEMO:TEMP");
//! assert!(cx.open(temp));
//!
//! control.connect("DEMO:TEMP");
//! cx.poll(100);
//! control.complete_gets();
//! cx.poll(100);
//!
//! assert_eq!(cx.channel(temp).unwrap().get_floating(0), 21.5);
//! cx.finalise();
//! ```

mod channels;
mod error;
mod observers;

pub use error::ContextError;

use crate::channel::{Channel, Link, TokenSource};
use crate::core::config::ClientConfig;
use crate::core::diagnostics::ExceptionAccumulator;
use crate::core::error_handling::{describe_error, log_error_with_context};
use crate::dispatch::{dispatch, ObserverEntry, MIN_POLL_INTERVAL};
use crate::queue::{Notification, NotificationQueue, QueueStats};
use crate::registry::{resolve, ChannelId, ObserverId, SlotMap};
use crate::service::ChannelService;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

static ACTIVE: AtomicBool = AtomicBool::new(false);
static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

pub struct Context {
    serial: u64,
    config: ClientConfig,
    service: Box<dyn ChannelService>,
    queue: Arc<NotificationQueue>,
    pub(crate) channels: SlotMap<ChannelId, Channel>,
    pub(crate) observers: SlotMap<ObserverId, ObserverEntry>,
    tokens: TokenSource,
    exceptions: ExceptionAccumulator,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("serial", &self.serial)
            .field("channels", &self.channels.len())
            .field("observers", &self.observers.len())
            .field("queue", &self.queue.stats())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Start the runtime: create the queue and attach `service` to it.
    ///
    /// Fails if another context is still active.
    pub fn initialise<S>(config: ClientConfig, service: S) -> Result<Context, ContextError>
    where
        S: ChannelService + 'static,
    {
        if ACTIVE
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ContextError::AlreadyActive);
        }

        let config = config.normalised();
        let queue = Arc::new(NotificationQueue::new(config.coalesce_threshold));
        queue.initialise();

        let mut service: Box<dyn ChannelService> = Box::new(service);
        if let Err(e) = service.attach(queue.sender()) {
            queue.shutdown();
            ACTIVE.store(false, Ordering::SeqCst);
            let error = ContextError::from(e);
            log_error_with_context(&error, "Initialising client context");
            return Err(error);
        }

        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "Client context {} initialised (protocol {}, max array bytes {})",
            serial,
            service.protocol_version(),
            config.max_array_bytes
        );

        Ok(Context {
            serial,
            config,
            service,
            queue,
            channels: SlotMap::new(),
            observers: SlotMap::new(),
            tokens: TokenSource::default(),
            exceptions: ExceptionAccumulator::new(),
        })
    }

    /// Whether a context is active anywhere in the process.
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::SeqCst)
    }

    /// Close every channel, detach the service and discard anything still
    /// queued. Dropping the context does the same.
    pub fn finalise(self) {
        drop(self);
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn protocol_version(&self) -> String {
        self.service.protocol_version()
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Updates superseded by coalescing since the previous call.
    pub fn take_discarded_updates(&self) -> u64 {
        self.queue.take_discarded_updates()
    }

    /// Send buffered requests to the service.
    pub fn flush(&mut self) -> bool {
        match self.service.flush() {
            Ok(()) => true,
            Err(e) => {
                crate::report_error!("{}", describe_error(&e, "flush"));
                false
            }
        }
    }

    /// Flush, then handle up to `max_items` queued notifications (at least
    /// one if any are queued). Returns how many were handled, or `None` if
    /// the queue is not running.
    pub fn poll(&mut self, max_items: usize) -> Option<usize> {
        self.flush();
        let queue = Arc::clone(&self.queue);
        queue.drain(max_items, |item| self.handle_notification(item))
    }

    /// [`poll`](Self::poll) with the configured batch size.
    pub fn poll_default(&mut self) -> Option<usize> {
        self.poll(self.config.poll_max_items)
    }

    /// Poll every `interval` until `shutdown` fires or its sender is gone.
    ///
    /// The context is not `Send`, so run this on a current-thread runtime
    /// or inside a `LocalSet`.
    pub async fn run_poll_loop(&mut self, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    log::debug!("Poll loop of context {} stopping", self.serial);
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_default();
                }
            }
        }
    }

    fn handle_notification(&mut self, item: Notification) {
        match item {
            Notification::Diagnostic(text) => self.exceptions.accept(&text),
            Notification::Connection(event) => {
                let Ok(id) = resolve(
                    &self.channels,
                    self.serial,
                    event.tag,
                    event.handle,
                    Channel::handle,
                ) else {
                    return;
                };
                let outcome = self.with_channel(id, |channel, link| {
                    channel.on_connection(link, event.is_up)
                });
                if let Some(event) = outcome.flatten() {
                    dispatch(self, id, event);
                }
            }
            Notification::Update(event) => {
                let Ok(id) = resolve(
                    &self.channels,
                    self.serial,
                    event.tag,
                    event.handle,
                    Channel::handle,
                ) else {
                    return;
                };
                let outcome = self.channels.get_mut(id).and_then(|c| c.on_update(event));
                if let Some(event) = outcome {
                    dispatch(self, id, event);
                }
            }
        }
    }

    /// Run `f` on a channel together with the service link.
    pub(crate) fn with_channel<R>(
        &mut self,
        id: ChannelId,
        f: impl FnOnce(&mut Channel, &mut Link<'_>) -> R,
    ) -> Option<R> {
        let channel = self.channels.get_mut(id)?;
        let mut link = Link {
            service: self.service.as_mut(),
            tokens: &mut self.tokens,
            max_array_bytes: self.config.max_array_bytes,
        };
        Some(f(channel, &mut link))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        for id in self.channels.keys() {
            self.with_channel(id, |channel, link| channel.close(link));
        }
        self.channels = SlotMap::new();
        self.observers = SlotMap::new();
        self.service.detach();
        self.queue.shutdown();
        ACTIVE.store(false, Ordering::SeqCst);
        log::info!("Client context {} finalised", self.serial);
    }
}

#[cfg(test)]
mod tests;

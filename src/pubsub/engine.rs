// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Single-producer, multi-consumer fan-out over decoded messages.
//!
//! One thread reads the MCAP sequentially and publishes each decoded
//! message by topic; each subscriber runs on its own thread reading from a
//! bounded channel, so a slow subscriber (the HDF5 writer, say) applies
//! backpressure to the producer without blocking the other subscribers.
//! Every subscriber sees an `Init` event before the first message and an
//! `Eof` event once the producer is done, so subscribers can open/close
//! resources (a plot canvas, an HDF5 file) without needing a separate setup
//! call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::{bounded, Sender};

use crate::core::{DecodedMessage, IngestError, Result};

use super::routing::RoutingTable;

/// One event delivered to a subscriber.
#[derive(Debug, Clone)]
pub enum Event {
    /// Sent once, before any message.
    Init,
    /// A decoded message on a routed topic.
    Message {
        topic: String,
        message: DecodedMessage,
        log_time: u64,
    },
    /// Sent once, after the producer has exhausted the source.
    Eof,
}

/// A pipeline stage that consumes routed messages on its own thread.
pub trait Subscriber: Send + 'static {
    /// The routing name this subscriber is registered under.
    fn name(&self) -> &str;

    /// Handle one event. Returning `Err` marks the subscriber's result
    /// failed but does not stop other subscribers or the producer.
    fn handle(&mut self, event: &Event) -> Result<()>;

    /// Called after the subscriber's channel closes (post-`Eof`), to let it
    /// report a final, subscriber-specific outcome (e.g. a PNG path).
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Per-subscriber result keyed by subscriber name.
pub type EngineResults = HashMap<String, Result<()>>;

/// Bounded channel capacity for each subscriber's inbox. Chosen to absorb a
/// burst of messages on one topic without unbounded memory growth; a
/// subscriber that falls this far behind slows the whole producer down,
/// which is the intended backpressure behavior.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 1024;

/// Drives the fan-out: wires one bounded channel per subscriber, spawns a
/// worker thread per subscriber, then replays `messages` through
/// `routing_table`.
///
/// If `cancel` is observed set partway through, the producer stops pulling
/// further items from `messages` but still sends `Eof` to every subscriber
/// so they exit cleanly rather than hanging on a half-drained channel.
pub fn run<I>(
    subscribers: Vec<Box<dyn Subscriber>>,
    messages: I,
    routing_table: &RoutingTable,
    cancel: &AtomicBool,
) -> EngineResults
where
    I: IntoIterator<Item = Result<(String, DecodedMessage, u64)>>,
{
    let mut senders: HashMap<String, Sender<Event>> = HashMap::new();
    let mut workers = Vec::new();

    for subscriber in subscribers {
        let name = subscriber.name().to_string();
        let (tx, rx) = bounded::<Event>(SUBSCRIBER_CHANNEL_CAPACITY);
        senders.insert(name.clone(), tx);

        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(format!("subscriber-{name}"))
            .spawn(move || {
                let span = tracing::info_span!("subscriber", name = %worker_name);
                let _guard = span.enter();
                let mut subscriber = subscriber;
                let mut outcome = Ok(());
                for event in rx {
                    if let Err(err) = subscriber.handle(&event) {
                        tracing::warn!(cause = %err, "subscriber event handling failed");
                        outcome = Err(err);
                    }
                }
                if outcome.is_ok() {
                    outcome = subscriber.finish();
                } else {
                    let _ = subscriber.finish();
                }
                (worker_name, outcome)
            })
            .expect("spawning subscriber thread");
        workers.push(handle);
    }

    broadcast(&senders, Event::Init);

    for item in messages {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!("cancellation observed, stopping message production early");
            break;
        }
        match item {
            Ok((topic, message, log_time)) => {
                let event = Event::Message {
                    topic: topic.clone(),
                    message,
                    log_time,
                };
                for name in routing_table.route(&topic) {
                    if let Some(tx) = senders.get(*name) {
                        let _ = tx.send(event.clone());
                    }
                }
            }
            Err(err) => {
                tracing::warn!(cause = %err, "producer read failed, message skipped");
            }
        }
    }

    broadcast(&senders, Event::Eof);
    drop(senders);

    let mut results = EngineResults::new();
    for handle in workers {
        let (name, outcome) = handle.join().unwrap_or_else(|_| {
            (
                "unknown".to_string(),
                Err(IngestError::Other("subscriber thread panicked".to_string())),
            )
        });
        results.insert(name, outcome);
    }
    results
}

fn broadcast(senders: &HashMap<String, Sender<Event>>, event: Event) {
    for tx in senders.values() {
        let _ = tx.send(event.clone());
    }
}

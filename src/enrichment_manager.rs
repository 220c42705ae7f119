//! Track enrichment runtime component.
//!
//! On track activation this manager either reuses stored lookup fields or
//! starts one outbound lookup, cancelling whatever lookup was still in
//! flight for a previously activated track. At most one attempt is current
//! at any time; results from superseded attempts are discarded unseen.

use std::sync::Arc;
use std::thread;

use log::{debug, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::cancellation::CancellationScope;
use crate::metadata_client::{LookupError, TrackLookup};
use crate::protocol::{
    EnrichmentMessage, EnrichmentStatus, LibraryMessage, Message, Track, TrackMetadata,
};

/// Workflow position for the most recent activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkflowState {
    Idle,
    Enriching,
    Enriched,
    Failed,
    Cancelled,
}

/// Drives the per-activation enrichment workflow.
pub struct EnrichmentManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    client: Arc<dyn TrackLookup>,
    in_flight: Option<CancellationScope>,
    generation: u64,
    state: WorkflowState,
}

impl EnrichmentManager {
    /// Creates an enrichment manager bound to bus channels and one lookup
    /// source.
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        client: Arc<dyn TrackLookup>,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            client,
            in_flight: None,
            generation: 0,
            state: WorkflowState::Idle,
        }
    }

    fn set_state(&mut self, next: WorkflowState) {
        if self.state != next {
            debug!("Enrichment workflow: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn publish_status(&self, file_path: &str, status: EnrichmentStatus) {
        let _ = self
            .bus_producer
            .send(Message::Enrichment(EnrichmentMessage::StatusChanged {
                file_path: file_path.to_string(),
                status,
            }));
    }

    fn handle_track_activated(&mut self, track: Track) {
        if track.has_artist() {
            debug!(
                "Using stored lookup fields for {}, no request needed",
                track.file_path
            );
            self.set_state(WorkflowState::Enriched);
            self.publish_status(&track.file_path, EnrichmentStatus::Ready { cached: true });
            return;
        }

        if let Some(previous) = self.in_flight.take() {
            debug!("Cancelling in-flight lookup before starting a new one");
            previous.cancel();
        }

        let scope = CancellationScope::new();
        self.generation += 1;
        self.in_flight = Some(scope.clone());
        self.set_state(WorkflowState::Enriching);
        self.publish_status(&track.file_path, EnrichmentStatus::Searching);

        let client = Arc::clone(&self.client);
        let producer = self.bus_producer.clone();
        let generation = self.generation;
        thread::spawn(move || {
            let outcome = client.lookup(&track.title, &scope);
            let _ = producer.send(Message::Enrichment(EnrichmentMessage::LookupFinished {
                generation,
                file_path: track.file_path,
                outcome,
            }));
        });
    }

    fn handle_lookup_finished(
        &mut self,
        generation: u64,
        file_path: String,
        outcome: Result<Option<TrackMetadata>, LookupError>,
    ) {
        if generation != self.generation {
            debug!("Discarding superseded lookup result for {}", file_path);
            return;
        }
        self.in_flight = None;

        match outcome {
            Ok(Some(metadata)) => {
                let _ = self
                    .bus_producer
                    .send(Message::Library(LibraryMessage::ApplyEnrichment {
                        file_path: file_path.clone(),
                        metadata,
                    }));
                self.set_state(WorkflowState::Enriched);
                self.publish_status(&file_path, EnrichmentStatus::Ready { cached: false });
            }
            Ok(None) => {
                self.set_state(WorkflowState::Enriched);
                self.publish_status(&file_path, EnrichmentStatus::NoInfoFound);
            }
            Err(LookupError::Cancelled) => {
                // Superseded attempt; whatever status the replacement set
                // stays in place.
                self.set_state(WorkflowState::Cancelled);
            }
            Err(err) => {
                warn!("Lookup for {} failed: {}", file_path, err);
                self.set_state(WorkflowState::Failed);
                self.publish_status(&file_path, EnrichmentStatus::LookupFailed);
            }
        }
    }

    pub fn run(&mut self) {
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => match message {
                    Message::Enrichment(EnrichmentMessage::TrackActivated(track)) => {
                        self.handle_track_activated(track);
                    }
                    Message::Enrichment(EnrichmentMessage::LookupFinished {
                        generation,
                        file_path,
                        outcome,
                    }) => {
                        self.handle_lookup_finished(generation, file_path, outcome);
                    }
                    _ => {}
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "EnrichmentManager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::{self, error::TryRecvError, Receiver, Sender};

    /// Scripted lookup source keyed by title. A per-title hold delays the
    /// response so tests can interleave two attempts deterministically.
    struct ScriptedLookup {
        calls: AtomicUsize,
        responses: Mutex<Vec<(String, Result<Option<TrackMetadata>, LookupError>)>>,
        holds: Mutex<Vec<(String, Duration)>>,
        honor_scope: bool,
    }

    impl ScriptedLookup {
        fn new(honor_scope: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(Vec::new()),
                holds: Mutex::new(Vec::new()),
                honor_scope,
            }
        }

        fn respond(&self, title: &str, outcome: Result<Option<TrackMetadata>, LookupError>) {
            self.responses
                .lock()
                .expect("responses lock poisoned")
                .push((title.to_string(), outcome));
        }

        fn hold(&self, title: &str, delay: Duration) {
            self.holds
                .lock()
                .expect("holds lock poisoned")
                .push((title.to_string(), delay));
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TrackLookup for ScriptedLookup {
        fn lookup(
            &self,
            title: &str,
            scope: &CancellationScope,
        ) -> Result<Option<TrackMetadata>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            let hold = self
                .holds
                .lock()
                .expect("holds lock poisoned")
                .iter()
                .find(|(held, _)| held == title)
                .map(|(_, delay)| *delay);
            if let Some(delay) = hold {
                std::thread::sleep(delay);
            }

            if self.honor_scope && scope.is_cancelled() {
                return Err(LookupError::Cancelled);
            }

            self.responses
                .lock()
                .expect("responses lock poisoned")
                .iter()
                .find(|(scripted, _)| scripted == title)
                .map(|(_, outcome)| outcome.clone())
                .unwrap_or(Ok(None))
        }
    }

    struct EnrichmentHarness {
        bus_sender: Sender<Message>,
        receiver: Receiver<Message>,
        client: Arc<ScriptedLookup>,
    }

    impl EnrichmentHarness {
        fn new(client: ScriptedLookup) -> Self {
            let client = Arc::new(client);
            let (bus_sender, _) = broadcast::channel(1024);
            let manager_receiver = bus_sender.subscribe();
            let manager_sender = bus_sender.clone();
            let manager_client: Arc<dyn TrackLookup> = client.clone();
            std::thread::spawn(move || {
                let mut manager =
                    EnrichmentManager::new(manager_receiver, manager_sender, manager_client);
                manager.run();
            });

            let receiver = bus_sender.subscribe();
            Self {
                bus_sender,
                receiver,
                client,
            }
        }

        fn activate(&self, track: &Track) {
            self.bus_sender
                .send(Message::Enrichment(EnrichmentMessage::TrackActivated(
                    track.clone(),
                )))
                .expect("failed to send message to bus");
        }

        fn collect_messages(&mut self, window: Duration) -> Vec<Message> {
            let start = Instant::now();
            let mut messages = Vec::new();
            while start.elapsed() < window {
                match self.receiver.try_recv() {
                    Ok(message) => messages.push(message),
                    Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(5)),
                    Err(TryRecvError::Lagged(_)) => continue,
                    Err(TryRecvError::Closed) => break,
                }
            }
            messages
        }
    }

    fn wait_for_message<F>(
        receiver: &mut Receiver<Message>,
        timeout: Duration,
        mut predicate: F,
    ) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                panic!("timed out waiting for expected message");
            }
            match receiver.try_recv() {
                Ok(message) => {
                    if predicate(&message) {
                        return message;
                    }
                }
                Err(TryRecvError::Empty) => std::thread::sleep(Duration::from_millis(5)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("bus closed while waiting for message"),
            }
        }
    }

    fn metadata(artist: &str) -> TrackMetadata {
        TrackMetadata {
            track_name: "Track".to_string(),
            artist_name: artist.to_string(),
            album_name: "Album".to_string(),
            artwork_url: None,
        }
    }

    fn apply_enrichments_in(messages: &[Message]) -> Vec<(String, TrackMetadata)> {
        messages
            .iter()
            .filter_map(|message| match message {
                Message::Library(LibraryMessage::ApplyEnrichment {
                    file_path,
                    metadata,
                }) => Some((file_path.clone(), metadata.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn stored_fields_satisfy_activation_without_a_lookup() {
        let client = ScriptedLookup::new(true);
        let mut harness = EnrichmentHarness::new(client);

        let mut track = Track::from_file_path(Path::new("/music/imagine.mp3"));
        track.artist = Some("John Lennon".to_string());

        harness.activate(&track);
        harness.activate(&track);

        // Both activations must resolve from stored fields.
        for _ in 0..2 {
            let status = wait_for_message(
                &mut harness.receiver,
                Duration::from_secs(1),
                |message| {
                    matches!(
                        message,
                        Message::Enrichment(EnrichmentMessage::StatusChanged {
                            status: EnrichmentStatus::Ready { cached: true },
                            ..
                        })
                    )
                },
            );
            if let Message::Enrichment(EnrichmentMessage::StatusChanged { file_path, .. }) = status
            {
                assert_eq!(file_path, "/music/imagine.mp3");
            }
        }
        assert_eq!(harness.client.call_count(), 0);
    }

    #[test]
    fn successful_lookup_applies_fields_exactly_once() {
        let client = ScriptedLookup::new(true);
        client.respond("imagine", Ok(Some(metadata("John Lennon"))));
        let mut harness = EnrichmentHarness::new(client);

        harness.activate(&Track::from_file_path(Path::new("/music/imagine.mp3")));

        let messages = harness.collect_messages(Duration::from_millis(400));
        let statuses: Vec<_> = messages
            .iter()
            .filter_map(|message| match message {
                Message::Enrichment(EnrichmentMessage::StatusChanged { status, .. }) => {
                    Some(*status)
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                EnrichmentStatus::Searching,
                EnrichmentStatus::Ready { cached: false }
            ]
        );

        let applies = apply_enrichments_in(&messages);
        assert_eq!(applies.len(), 1);
        assert_eq!(applies[0].0, "/music/imagine.mp3");
        assert_eq!(applies[0].1.artist_name, "John Lennon");
        assert_eq!(harness.client.call_count(), 1);
    }

    #[test]
    fn lookup_without_result_reports_no_info_found() {
        let client = ScriptedLookup::new(true);
        client.respond("unknown", Ok(None));
        let mut harness = EnrichmentHarness::new(client);

        harness.activate(&Track::from_file_path(Path::new("/music/unknown.mp3")));
        wait_for_message(&mut harness.receiver, Duration::from_secs(1), |message| {
            matches!(
                message,
                Message::Enrichment(EnrichmentMessage::StatusChanged {
                    status: EnrichmentStatus::NoInfoFound,
                    ..
                })
            )
        });

        let tail = harness.collect_messages(Duration::from_millis(100));
        assert!(apply_enrichments_in(&tail).is_empty());
    }

    #[test]
    fn transport_failure_reports_generic_lookup_failure() {
        let client = ScriptedLookup::new(true);
        client.respond(
            "broken",
            Err(LookupError::Transport("connection refused".to_string())),
        );
        let mut harness = EnrichmentHarness::new(client);

        harness.activate(&Track::from_file_path(Path::new("/music/broken.mp3")));
        wait_for_message(&mut harness.receiver, Duration::from_secs(1), |message| {
            matches!(
                message,
                Message::Enrichment(EnrichmentMessage::StatusChanged {
                    status: EnrichmentStatus::LookupFailed,
                    ..
                })
            )
        });

        let tail = harness.collect_messages(Duration::from_millis(100));
        assert!(apply_enrichments_in(&tail).is_empty());
    }

    #[test]
    fn switching_tracks_discards_the_slower_first_attempt() {
        // The first lookup ignores its scope and completes with a result
        // anyway; the generation check alone must discard it.
        let client = ScriptedLookup::new(false);
        client.hold("slow", Duration::from_millis(300));
        client.respond("slow", Ok(Some(metadata("Stale Artist"))));
        client.respond("fast", Ok(Some(metadata("Fresh Artist"))));
        let mut harness = EnrichmentHarness::new(client);

        harness.activate(&Track::from_file_path(Path::new("/music/slow.mp3")));
        harness.activate(&Track::from_file_path(Path::new("/music/fast.mp3")));

        let messages = harness.collect_messages(Duration::from_millis(800));
        let applies = apply_enrichments_in(&messages);
        assert_eq!(applies.len(), 1);
        assert_eq!(applies[0].0, "/music/fast.mp3");
        assert_eq!(applies[0].1.artist_name, "Fresh Artist");
        assert_eq!(harness.client.call_count(), 2);
    }

    #[test]
    fn cancelled_attempt_emits_no_status_and_mutates_nothing() {
        // Here the first lookup honors its scope and reports cancellation.
        let client = ScriptedLookup::new(true);
        client.hold("slow", Duration::from_millis(300));
        client.respond("slow", Ok(Some(metadata("Stale Artist"))));
        client.respond("fast", Ok(Some(metadata("Fresh Artist"))));
        let mut harness = EnrichmentHarness::new(client);

        harness.activate(&Track::from_file_path(Path::new("/music/slow.mp3")));
        harness.activate(&Track::from_file_path(Path::new("/music/fast.mp3")));

        let messages = harness.collect_messages(Duration::from_millis(800));
        let applies = apply_enrichments_in(&messages);
        assert_eq!(applies.len(), 1);
        assert_eq!(applies[0].0, "/music/fast.mp3");

        // No status message may mention the cancelled track beyond its
        // initial Searching notification.
        for message in &messages {
            if let Message::Enrichment(EnrichmentMessage::StatusChanged { file_path, status }) =
                message
            {
                if file_path == "/music/slow.mp3" {
                    assert_eq!(*status, EnrichmentStatus::Searching);
                }
            }
        }
    }
}

//! Playback runtime component.
//!
//! Wraps the platform media transport behind a narrow interface and keeps
//! the position display fed while a track is playing. A manual seek drag
//! freezes position updates until the drag commits.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::protocol::{Message, PlaybackMessage, PlaybackState};

/// Interface to the platform media object.
///
/// Implementations live with the embedding frontend; this crate only
/// drives the transport and never decodes audio itself.
pub trait MediaTransport: Send {
    fn open(&mut self, path: &str) -> Result<(), String>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position: Duration);
    fn set_volume(&mut self, volume: f32);
    fn position(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    /// Reports the end-of-media signal at most once per completed playback;
    /// reading it clears the latch.
    fn take_media_ended(&mut self) -> bool;
}

/// Drives the media transport and the position poll ticker.
pub struct PlaybackManager {
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    transport: Box<dyn MediaTransport>,
    is_playing: Arc<AtomicBool>,
    user_seeking: bool,
    poll_interval: Duration,
}

impl PlaybackManager {
    /// Creates a playback manager bound to bus channels and one transport.
    pub fn new(
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
        transport: Box<dyn MediaTransport>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            bus_consumer,
            bus_producer,
            transport,
            is_playing: Arc::new(AtomicBool::new(false)),
            user_seeking: false,
            poll_interval,
        }
    }

    fn publish(&self, message: PlaybackMessage) {
        let _ = self.bus_producer.send(Message::Playback(message));
    }

    fn set_playing(&self, playing: bool) {
        self.is_playing.store(playing, Ordering::Relaxed);
    }

    /// Emits poll ticks while a track is playing; stops with the bus.
    fn spawn_ticker(&self) {
        let playing = Arc::clone(&self.is_playing);
        let producer = self.bus_producer.clone();
        let interval = self.poll_interval;
        thread::spawn(move || loop {
            if playing.load(Ordering::Relaxed)
                && producer
                    .send(Message::Playback(PlaybackMessage::PollTick))
                    .is_err()
            {
                break;
            }
            thread::sleep(interval);
        });
    }

    fn open_and_play(&mut self, path: &str) {
        match self.transport.open(path) {
            Ok(()) => {
                debug!("Transport opened {}", path);
                self.transport.play();
                self.user_seeking = false;
                self.set_playing(true);
                self.publish(PlaybackMessage::StateChanged(PlaybackState::Playing));
            }
            Err(err) => {
                error!("Failed to open {}: {}", path, err);
                self.set_playing(false);
                self.publish(PlaybackMessage::StateChanged(PlaybackState::Stopped));
            }
        }
    }

    fn handle_poll_tick(&mut self) {
        if self.transport.take_media_ended() {
            debug!("End of media reached, resetting playback state");
            self.transport.stop();
            self.set_playing(false);
            self.user_seeking = false;
            self.publish(PlaybackMessage::StateChanged(PlaybackState::Stopped));
            self.publish(PlaybackMessage::TrackFinished);
            return;
        }

        if !self.is_playing.load(Ordering::Relaxed) || self.user_seeking {
            return;
        }

        if let (Some(position), Some(duration)) =
            (self.transport.position(), self.transport.duration())
        {
            self.publish(PlaybackMessage::PlaybackProgress {
                elapsed_ms: position.as_millis() as u64,
                total_ms: duration.as_millis() as u64,
            });
        }
    }

    pub fn run(&mut self) {
        self.spawn_ticker();
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(message) => match message {
                    Message::Playback(PlaybackMessage::OpenAndPlay(path)) => {
                        self.open_and_play(&path);
                    }
                    Message::Playback(PlaybackMessage::Play) => {
                        self.transport.play();
                        self.set_playing(true);
                        self.publish(PlaybackMessage::StateChanged(PlaybackState::Playing));
                    }
                    Message::Playback(PlaybackMessage::Pause) => {
                        self.transport.pause();
                        self.set_playing(false);
                        self.publish(PlaybackMessage::StateChanged(PlaybackState::Paused));
                    }
                    Message::Playback(PlaybackMessage::Stop) => {
                        self.transport.stop();
                        self.set_playing(false);
                        self.user_seeking = false;
                        self.publish(PlaybackMessage::StateChanged(PlaybackState::Stopped));
                    }
                    Message::Playback(PlaybackMessage::SeekTo(position_ms)) => {
                        self.transport.seek(Duration::from_millis(position_ms));
                    }
                    Message::Playback(PlaybackMessage::SetVolume(volume)) => {
                        self.transport.set_volume(volume.clamp(0.0, 1.0));
                    }
                    Message::Playback(PlaybackMessage::BeginSeekDrag) => {
                        self.user_seeking = true;
                    }
                    Message::Playback(PlaybackMessage::EndSeekDrag(position_ms)) => {
                        self.transport.seek(Duration::from_millis(position_ms));
                        self.user_seeking = false;
                    }
                    Message::Playback(PlaybackMessage::PollTick) => {
                        self.handle_poll_tick();
                    }
                    _ => {}
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "PlaybackManager lagged on control bus, skipped {} message(s)",
                        skipped
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

//! The realtime audio bridge between the student's microphone/speaker and the
//! remote conversational tutor.
//!
//! The bridge is either `Idle` or `Active`. While active it runs two tasks: the
//! uplink forwards captured microphone frames one at a time, the downlink
//! schedules incoming speech for gapless playback, keeps the rolling transcript
//! and handles barge-in. Both are cancelled by `stop()`, by a transport failure,
//! or when the bridge is dropped; in every case the microphone is released.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::frame::AudioFrame;
use super::scheduler::PlaybackScheduler;
use super::transcript::{Speaker, TranscriptEntry, TranscriptLog};
use crate::ports::{
    Microphone, PlaybackClock, PlaybackSink, PortError, RealtimeConnector, RealtimeEvent,
    TutorSessionConfig,
};

pub const TUTOR_SYSTEM_PROMPT: &str = "You are an expert Socratic Tutor for Year 1-11 students. \
Your mission is to help them understand school concepts. RULE: NEVER give the answer immediately. \
Ask guiding questions, use helpful analogies, and be very encouraging. If they sound stuck, give them a hint. \
Keep responses short and spoken.";

pub const DEFAULT_TUTOR_VOICE: &str = "alloy";

const EVENT_CAPACITY: usize = 64;

impl TutorSessionConfig {
    /// The hint-first tutor persona, spoken with `voice`.
    pub fn socratic_tutor(voice: impl Into<String>) -> Self {
        Self {
            system_prompt: TUTOR_SYSTEM_PROMPT.to_string(),
            voice: voice.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    Idle,
    Active,
}

/// Failures reported to whoever drives the bridge. None of them are fatal to the host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("microphone access was denied")]
    PermissionDenied,
    #[error("could not reach the tutor: {0}")]
    Network(String),
    #[error("the connection to the tutor was interrupted: {0}")]
    ConnectionInterrupted(String),
}

impl From<PortError> for BridgeError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::PermissionDenied => BridgeError::PermissionDenied,
            PortError::ConnectionInterrupted(msg) => BridgeError::ConnectionInterrupted(msg),
            other => BridgeError::Network(other.to_string()),
        }
    }
}

/// Notifications published while the bridge runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    Status(BridgeStatus),
    Transcript(TranscriptEntry),
    /// Queued tutor speech was discarded because the student spoke over it.
    Interrupted,
    Error(BridgeError),
}

/// The devices and remote endpoint the bridge drives.
#[derive(Clone)]
pub struct BridgeDevices {
    pub microphone: Arc<dyn Microphone>,
    pub connector: Arc<dyn RealtimeConnector>,
    pub sink: Arc<dyn PlaybackSink>,
    pub clock: Arc<dyn PlaybackClock>,
}

struct ActiveSession {
    generation: u64,
    cancel: CancellationToken,
    remote_shutdown: CancellationToken,
    uplink: JoinHandle<()>,
    downlink: JoinHandle<()>,
}

enum BridgeState {
    Idle,
    Active(ActiveSession),
}

/// State shared between the bridge handle and its tasks.
struct Shared {
    devices: BridgeDevices,
    state: Mutex<BridgeState>,
    scheduler: Mutex<PlaybackScheduler>,
    transcript: Mutex<TranscriptLog>,
    events: broadcast::Sender<BridgeEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn emit(&self, event: BridgeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn flush_playback(&self) {
        let stopped = lock(&self.scheduler).interrupt();
        for id in stopped {
            self.devices.sink.stop(id);
        }
    }

    /// Moves to Idle if the active session is `generation` (or any session when
    /// `None`), releasing every device. Returns the session whose tasks the
    /// caller may still want to join.
    fn teardown(&self, generation: Option<u64>, failure: Option<BridgeError>) -> Option<ActiveSession> {
        let session = {
            let mut state = lock(&self.state);
            let matches = match &*state {
                BridgeState::Active(s) => generation.map_or(true, |g| g == s.generation),
                BridgeState::Idle => false,
            };
            if !matches {
                return None;
            }
            match std::mem::replace(&mut *state, BridgeState::Idle) {
                BridgeState::Active(session) => session,
                BridgeState::Idle => return None,
            }
        };

        session.cancel.cancel();
        session.remote_shutdown.cancel();
        self.devices.microphone.release();
        self.flush_playback();

        if let Some(failure) = failure {
            warn!("Tutor session ended with an error: {}", failure);
            self.emit(BridgeEvent::Error(failure));
        }
        self.emit(BridgeEvent::Status(BridgeStatus::Idle));
        info!("Tutor session {} stopped.", session.generation);
        Some(session)
    }

    fn record(&self, speaker: Speaker, text: String) {
        let entry = lock(&self.transcript).push(speaker, text);
        self.emit(BridgeEvent::Transcript(entry));
    }
}

pub struct RealtimeAudioBridge {
    shared: Arc<Shared>,
    config: TutorSessionConfig,
    /// Serializes `start` and `stop`.
    lifecycle: tokio::sync::Mutex<()>,
    generations: AtomicU64,
}

impl RealtimeAudioBridge {
    pub fn new(devices: BridgeDevices, config: TutorSessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                devices,
                state: Mutex::new(BridgeState::Idle),
                scheduler: Mutex::new(PlaybackScheduler::new()),
                transcript: Mutex::new(TranscriptLog::default()),
                events,
            }),
            config,
            lifecycle: tokio::sync::Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> BridgeStatus {
        match &*lock(&self.shared.state) {
            BridgeState::Idle => BridgeStatus::Idle,
            BridgeState::Active(_) => BridgeStatus::Active,
        }
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        lock(&self.shared.transcript).entries()
    }

    /// Opens the microphone and the remote session, then starts streaming.
    /// Calling it while already active does nothing.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.status() == BridgeStatus::Active {
            debug!("Tutor session already active, ignoring start.");
            return Ok(());
        }

        let devices = &self.shared.devices;
        let capture = match devices.microphone.open() {
            Ok(capture) => capture,
            Err(e) => return Err(self.fail_start(e)),
        };

        let channel = match devices.connector.connect(&self.config).await {
            Ok(channel) => channel,
            Err(e) => {
                devices.microphone.release();
                return Err(self.fail_start(e));
            }
        };

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        {
            // Held while spawning so a task that fails instantly still finds its session.
            let mut state = lock(&self.shared.state);
            let uplink = tokio::spawn(uplink(capture.frames, channel.outbound, cancel.clone()));
            let downlink = tokio::spawn(downlink(
                self.shared.clone(),
                channel.inbound,
                cancel.clone(),
                generation,
            ));
            *state = BridgeState::Active(ActiveSession {
                generation,
                cancel,
                remote_shutdown: channel.shutdown,
                uplink,
                downlink,
            });
        }

        info!("Tutor session {} started.", generation);
        self.shared.emit(BridgeEvent::Status(BridgeStatus::Active));
        Ok(())
    }

    /// Closes the remote session, releases the microphone and returns to Idle.
    /// Safe to call at any time, any number of times.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        // Covers a capture left open by a start that never became active.
        self.shared.devices.microphone.release();
        if let Some(session) = self.shared.teardown(None, None) {
            if let Err(e) = session.uplink.await {
                error!("Uplink task ended abnormally: {:?}", e);
            }
            if let Err(e) = session.downlink.await {
                error!("Downlink task ended abnormally: {:?}", e);
            }
        }
    }

    fn fail_start(&self, e: PortError) -> BridgeError {
        let failure = BridgeError::from(e);
        error!("Could not start tutor session: {}", failure);
        self.shared.emit(BridgeEvent::Error(failure.clone()));
        failure
    }
}

impl Drop for RealtimeAudioBridge {
    fn drop(&mut self) {
        if let Some(session) = self.shared.teardown(None, None) {
            session.uplink.abort();
            session.downlink.abort();
        }
    }
}

/// Forwards microphone frames upstream as they arrive.
async fn uplink(
    mut frames: mpsc::Receiver<AudioFrame>,
    outbound: mpsc::Sender<AudioFrame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => frame,
        };
        let Some(frame) = frame else {
            debug!("Microphone capture ended.");
            break;
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = outbound.send(frame) => {
                if sent.is_err() {
                    debug!("Remote session stopped accepting audio.");
                    break;
                }
            }
        }
    }
}

/// Handles everything the remote tutor sends until the session ends.
async fn downlink(
    shared: Arc<Shared>,
    mut inbound: mpsc::Receiver<RealtimeEvent>,
    cancel: CancellationToken,
    generation: u64,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = inbound.recv() => event,
        };

        match event {
            Some(RealtimeEvent::Audio(frame)) => {
                let now = shared.devices.clock.now();
                let slot = lock(&shared.scheduler).schedule(frame.duration(), now);
                shared.devices.sink.play(slot.id, &frame, slot.start);
            }
            Some(RealtimeEvent::InputTranscript(text)) => shared.record(Speaker::Student, text),
            Some(RealtimeEvent::OutputTranscript(text)) => shared.record(Speaker::Tutor, text),
            Some(RealtimeEvent::Interrupted) => {
                debug!("Student interrupted the tutor, flushing playback.");
                shared.flush_playback();
                shared.emit(BridgeEvent::Interrupted);
            }
            Some(RealtimeEvent::Error(message)) => {
                shared.teardown(Some(generation), Some(BridgeError::ConnectionInterrupted(message)));
                return;
            }
            Some(RealtimeEvent::Closed) => {
                shared.teardown(Some(generation), None);
                return;
            }
            None => {
                shared.teardown(
                    Some(generation),
                    Some(BridgeError::ConnectionInterrupted(
                        "the tutor connection closed unexpectedly".to_string(),
                    )),
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
    use crate::ports::{MicrophoneCapture, PortResult, RealtimeChannel, SourceId};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    //-------------------------------------------------------------------------------------
    // Fakes
    //-------------------------------------------------------------------------------------

    struct FakeMicrophone {
        granted: bool,
        feed: Mutex<Option<mpsc::Sender<AudioFrame>>>,
        releases: AtomicUsize,
    }

    impl FakeMicrophone {
        fn new(granted: bool) -> Arc<Self> {
            Arc::new(Self {
                granted,
                feed: Mutex::new(None),
                releases: AtomicUsize::new(0),
            })
        }

        fn feed(&self) -> mpsc::Sender<AudioFrame> {
            lock(&self.feed).clone().expect("microphone not opened")
        }
    }

    impl Microphone for FakeMicrophone {
        fn open(&self) -> PortResult<MicrophoneCapture> {
            if !self.granted {
                return Err(PortError::PermissionDenied);
            }
            let (tx, frames) = mpsc::channel(8);
            *lock(&self.feed) = Some(tx);
            Ok(MicrophoneCapture { frames })
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
            lock(&self.feed).take();
        }
    }

    /// The far side of a fake realtime session.
    struct Remote {
        from_student: mpsc::Receiver<AudioFrame>,
        to_student: mpsc::Sender<RealtimeEvent>,
        shutdown: CancellationToken,
    }

    struct FakeConnector {
        reachable: bool,
        connects: AtomicUsize,
        remote: Mutex<Option<Remote>>,
    }

    impl FakeConnector {
        fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self {
                reachable,
                connects: AtomicUsize::new(0),
                remote: Mutex::new(None),
            })
        }

        fn remote(&self) -> Remote {
            lock(&self.remote).take().expect("no session opened")
        }
    }

    #[async_trait]
    impl RealtimeConnector for FakeConnector {
        async fn connect(&self, config: &TutorSessionConfig) -> PortResult<RealtimeChannel> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            assert_eq!(config.system_prompt, TUTOR_SYSTEM_PROMPT);
            if !self.reachable {
                return Err(PortError::Network("connection refused".to_string()));
            }
            let (outbound, from_student) = mpsc::channel(8);
            let (to_student, inbound) = mpsc::channel(8);
            let shutdown = CancellationToken::new();
            *lock(&self.remote) = Some(Remote {
                from_student,
                to_student,
                shutdown: shutdown.clone(),
            });
            Ok(RealtimeChannel {
                outbound,
                inbound,
                shutdown,
            })
        }
    }

    struct FakeSink {
        played: mpsc::UnboundedSender<(SourceId, Duration)>,
        stopped: Mutex<Vec<SourceId>>,
    }

    impl PlaybackSink for FakeSink {
        fn play(&self, id: SourceId, _frame: &AudioFrame, start_at: Duration) {
            let _ = self.played.send((id, start_at));
        }

        fn stop(&self, id: SourceId) {
            lock(&self.stopped).push(id);
        }
    }

    #[derive(Default)]
    struct ManualClock(Mutex<Duration>);

    impl ManualClock {
        fn set(&self, t: Duration) {
            *lock(&self.0) = t;
        }
    }

    impl PlaybackClock for ManualClock {
        fn now(&self) -> Duration {
            *lock(&self.0)
        }
    }

    struct Rig {
        bridge: RealtimeAudioBridge,
        microphone: Arc<FakeMicrophone>,
        connector: Arc<FakeConnector>,
        sink: Arc<FakeSink>,
        played: mpsc::UnboundedReceiver<(SourceId, Duration)>,
        clock: Arc<ManualClock>,
        events: broadcast::Receiver<BridgeEvent>,
    }

    fn rig(granted: bool, reachable: bool) -> Rig {
        let microphone = FakeMicrophone::new(granted);
        let connector = FakeConnector::new(reachable);
        let (played_tx, played) = mpsc::unbounded_channel();
        let sink = Arc::new(FakeSink {
            played: played_tx,
            stopped: Mutex::new(Vec::new()),
        });
        let clock = Arc::new(ManualClock::default());
        let bridge = RealtimeAudioBridge::new(
            BridgeDevices {
                microphone: microphone.clone(),
                connector: connector.clone(),
                sink: sink.clone(),
                clock: clock.clone(),
            },
            TutorSessionConfig::socratic_tutor(DEFAULT_TUTOR_VOICE),
        );
        let events = bridge.subscribe();
        Rig {
            bridge,
            microphone,
            connector,
            sink,
            played,
            clock,
            events,
        }
    }

    fn one_second_of_speech() -> AudioFrame {
        AudioFrame::new(vec![0; OUTPUT_SAMPLE_RATE as usize], OUTPUT_SAMPLE_RATE)
    }

    async fn next_matching(
        events: &mut broadcast::Receiver<BridgeEvent>,
        wanted: impl Fn(&BridgeEvent) -> bool,
    ) -> BridgeEvent {
        timeout(WAIT, async {
            loop {
                let event = events.recv().await.expect("event channel closed");
                if wanted(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for bridge event")
    }

    //-------------------------------------------------------------------------------------
    // Tests
    //-------------------------------------------------------------------------------------

    #[tokio::test]
    async fn speech_plays_back_to_back_and_barge_in_flushes_it() {
        let mut rig = rig(true, true);
        rig.bridge.start().await.unwrap();
        assert_eq!(rig.bridge.status(), BridgeStatus::Active);
        let remote = rig.connector.remote();

        for _ in 0..3 {
            remote.to_student.send(RealtimeEvent::Audio(one_second_of_speech())).await.unwrap();
        }
        let mut scheduled = Vec::new();
        for _ in 0..3 {
            scheduled.push(timeout(WAIT, rig.played.recv()).await.unwrap().unwrap());
        }
        let starts: Vec<Duration> = scheduled.iter().map(|(_, start)| *start).collect();
        assert_eq!(
            starts,
            vec![Duration::ZERO, Duration::from_secs(1), Duration::from_secs(2)]
        );

        // Student talks over the second frame.
        rig.clock.set(Duration::from_millis(1500));
        remote.to_student.send(RealtimeEvent::Interrupted).await.unwrap();
        next_matching(&mut rig.events, |e| *e == BridgeEvent::Interrupted).await;

        let ids: Vec<SourceId> = scheduled.iter().map(|(id, _)| *id).collect();
        assert_eq!(*lock(&rig.sink.stopped), ids);

        // The cursor was rewound, so new speech starts now instead of at 3s.
        remote.to_student.send(RealtimeEvent::Audio(one_second_of_speech())).await.unwrap();
        let (_, start) = timeout(WAIT, rig.played.recv()).await.unwrap().unwrap();
        assert_eq!(start, Duration::from_millis(1500));

        rig.bridge.stop().await;
    }

    #[tokio::test]
    async fn microphone_frames_are_forwarded_as_they_arrive() {
        let rig = rig(true, true);
        rig.bridge.start().await.unwrap();
        let mut remote = rig.connector.remote();
        let feed = rig.microphone.feed();

        for n in 0..3 {
            let frame = AudioFrame::new(vec![n; 4], INPUT_SAMPLE_RATE);
            feed.send(frame.clone()).await.unwrap();
            let forwarded = timeout(WAIT, remote.from_student.recv()).await.unwrap().unwrap();
            assert_eq!(forwarded, frame);
        }

        rig.bridge.stop().await;
    }

    #[tokio::test]
    async fn transcripts_are_labelled_by_speaker() {
        let mut rig = rig(true, true);
        rig.bridge.start().await.unwrap();
        let remote = rig.connector.remote();

        remote.to_student.send(RealtimeEvent::InputTranscript("Why is the sky blue?".into())).await.unwrap();
        remote.to_student.send(RealtimeEvent::OutputTranscript("What colour is sunlight?".into())).await.unwrap();
        next_matching(&mut rig.events, |e| {
            matches!(e, BridgeEvent::Transcript(t) if t.speaker == Speaker::Tutor)
        })
        .await;

        let transcript = rig.bridge.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].to_string(), "Student: Why is the sky blue?");
        assert_eq!(transcript[1].to_string(), "Tutor: What colour is sunlight?");

        rig.bridge.stop().await;
    }

    #[tokio::test]
    async fn denied_microphone_never_connects() {
        let mut rig = rig(false, true);
        let err = rig.bridge.start().await.unwrap_err();
        assert_eq!(err, BridgeError::PermissionDenied);
        assert_eq!(rig.bridge.status(), BridgeStatus::Idle);
        assert_eq!(rig.connector.connects.load(Ordering::SeqCst), 0);
        next_matching(&mut rig.events, |e| *e == BridgeEvent::Error(BridgeError::PermissionDenied)).await;
    }

    #[tokio::test]
    async fn unreachable_tutor_releases_microphone() {
        let rig = rig(true, false);
        let err = rig.bridge.start().await.unwrap_err();
        assert!(matches!(err, BridgeError::Network(_)));
        assert_eq!(rig.bridge.status(), BridgeStatus::Idle);
        assert_eq!(rig.microphone.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_error_drops_to_idle() {
        let mut rig = rig(true, true);
        rig.bridge.start().await.unwrap();
        let remote = rig.connector.remote();

        remote.to_student.send(RealtimeEvent::Error("socket reset".into())).await.unwrap();
        let event = next_matching(&mut rig.events, |e| matches!(e, BridgeEvent::Error(_))).await;
        assert_eq!(
            event,
            BridgeEvent::Error(BridgeError::ConnectionInterrupted("socket reset".into()))
        );
        next_matching(&mut rig.events, |e| *e == BridgeEvent::Status(BridgeStatus::Idle)).await;

        assert_eq!(rig.bridge.status(), BridgeStatus::Idle);
        assert!(remote.shutdown.is_cancelled());
        assert!(rig.microphone.releases.load(Ordering::SeqCst) >= 1);

        // A fresh start is allowed after the failure.
        rig.bridge.start().await.unwrap();
        assert_eq!(rig.bridge.status(), BridgeStatus::Active);
        rig.bridge.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_closes_everything() {
        let rig = rig(true, true);
        rig.bridge.stop().await;
        assert_eq!(rig.bridge.status(), BridgeStatus::Idle);

        rig.bridge.start().await.unwrap();
        rig.bridge.start().await.unwrap();
        assert_eq!(rig.connector.connects.load(Ordering::SeqCst), 1);
        let remote = rig.connector.remote();

        rig.bridge.stop().await;
        rig.bridge.stop().await;
        assert_eq!(rig.bridge.status(), BridgeStatus::Idle);
        assert!(remote.shutdown.is_cancelled());
        assert!(rig.microphone.releases.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn dropping_the_bridge_releases_devices() {
        let rig = rig(true, true);
        rig.bridge.start().await.unwrap();
        let remote = rig.connector.remote();
        let microphone = rig.microphone.clone();

        drop(rig);

        assert!(remote.shutdown.is_cancelled());
        assert!(microphone.releases.load(Ordering::SeqCst) >= 1);
    }
}

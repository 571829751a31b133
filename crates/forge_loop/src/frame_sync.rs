use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::message::{Frame, Message};
use crate::processor::FrameProcessor;
use crate::ticker::{make_interval, Retune};

/// Tunables for a [`FrameSyncLoop`].
pub struct FrameSyncLoopConf {
    pub tick_hz: f64,
    pub default_fill: bool,
    pub resend: bool,
    pub delay_frames: u64,
    pub idle_interval: Option<Duration>,
    pub heartbeat_hz: Option<f64>,
    pub idle_handler: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl Default for FrameSyncLoopConf {
    fn default() -> Self {
        Self {
            tick_hz: 20.0,
            default_fill: true,
            resend: false,
            delay_frames: 0,
            idle_interval: None,
            heartbeat_hz: None,
            idle_handler: None,
        }
    }
}

#[derive(Default)]
struct PlayerState {
    last_sequence_id: u64,
}

struct State {
    players: HashMap<String, PlayerState>,
    frame_queue: HashMap<String, Message>,
    current_frame_id: u64,
    delay_buffer: HashMap<u64, (Frame, bool)>,
}

enum WriteOutcome {
    Accepted,
    Resend { expected: u64 },
    Rejected(Error),
}

struct Tasks {
    tick: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

/// Deterministic per-tick frame assembly loop: each registered player
/// contributes at most one [`Message`] per tick, aggregated into a single
/// [`Frame`] dispatched to `processor`.
pub struct FrameSyncLoop {
    conf: FrameSyncLoopConf,
    processor: Arc<dyn FrameProcessor>,
    state: Arc<Mutex<State>>,
    running: AtomicBool,
    stop: Mutex<CancellationToken>,
    retune: Retune,
    tasks: Mutex<Option<Tasks>>,
}

impl FrameSyncLoop {
    pub fn new(conf: FrameSyncLoopConf, processor: Arc<dyn FrameProcessor>) -> Self {
        let retune = Retune::new(conf.tick_hz);
        Self {
            conf,
            processor,
            state: Arc::new(Mutex::new(State {
                players: HashMap::new(),
                frame_queue: HashMap::new(),
                current_frame_id: 0,
                delay_buffer: HashMap::new(),
            })),
            running: AtomicBool::new(false),
            stop: Mutex::new(CancellationToken::new()),
            retune,
            tasks: Mutex::new(None),
        }
    }

    /// Adds `player_id` to the registered set. A no-op if already present.
    pub fn register(&self, player_id: impl Into<String>) {
        self.state.lock().players.entry(player_id.into()).or_default();
    }

    /// Removes `player_id` from the registered set and drops any pending
    /// slot it held.
    pub fn unregister(&self, player_id: &str) {
        let mut state = self.state.lock();
        state.players.remove(player_id);
        state.frame_queue.remove(player_id);
    }

    pub fn set_frequency(&self, hz: f64) -> bool {
        self.retune.set(hz)
    }

    /// Submits one player's input for the in-progress tick. See [`Error`]
    /// for rejection reasons. On a resend mismatch the call succeeds (it is
    /// not a rejection) but the slot is not consumed; `processor`'s
    /// `resend` hook fires instead.
    pub async fn write(&self, msg: Message) -> Result<(), Error> {
        let outcome = {
            let mut state = self.state.lock();
            decide_write(&mut state, &msg, self.conf.resend)
        };

        match outcome {
            WriteOutcome::Rejected(err) => Err(err),
            WriteOutcome::Resend { expected } => {
                self.processor.resend(msg.player_id, expected).await;
                Ok(())
            }
            WriteOutcome::Accepted => Ok(()),
        }
    }

    /// Spawns the tick task (and, if configured, the heartbeat task).
    /// Rejects with [`Error::AlreadyRunning`] on a second call.
    pub fn start(&self) -> Result<(), Error> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let stop = CancellationToken::new();
        *self.stop.lock() = stop.clone();

        let tick = tokio::spawn(run_tick(
            self.state.clone(),
            self.processor.clone(),
            self.retune.subscribe(),
            self.conf.default_fill,
            self.conf.delay_frames,
            self.conf.idle_interval,
            self.conf.idle_handler.clone(),
            stop.clone(),
        ));

        let heartbeat = self.conf.heartbeat_hz.map(|hz| {
            tokio::spawn(run_heartbeat(self.processor.clone(), hz, stop.clone()))
        });

        *self.tasks.lock() = Some(Tasks { tick, heartbeat });
        Ok(())
    }

    /// Idempotent: cancels the running tasks and waits for both to exit.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.lock().cancel();
        let tasks = self.tasks.lock().take();
        if let Some(tasks) = tasks {
            let _ = tasks.tick.await;
            if let Some(hb) = tasks.heartbeat {
                let _ = hb.await;
            }
        }
    }

    #[cfg(test)]
    fn current_frame_id(&self) -> u64 {
        self.state.lock().current_frame_id
    }

    #[cfg(test)]
    fn set_current_frame_id(&self, id: u64) {
        self.state.lock().current_frame_id = id;
    }

    #[cfg(test)]
    fn set_last_sequence_id(&self, player_id: &str, seq: u64) {
        self.state.lock().players.get_mut(player_id).unwrap().last_sequence_id = seq;
    }

    #[cfg(test)]
    fn pending(&self, player_id: &str) -> bool {
        self.state.lock().frame_queue.contains_key(player_id)
    }
}

fn decide_write(state: &mut State, msg: &Message, resend: bool) -> WriteOutcome {
    if !state.players.contains_key(&msg.player_id) {
        return WriteOutcome::Rejected(Error::NotRegistered);
    }
    if let Some(existing) = state.frame_queue.get(&msg.player_id) {
        if existing.frame_id >= msg.frame_id {
            return WriteOutcome::Rejected(Error::StaleOrDuplicate);
        }
    }
    if msg.frame_id <= state.current_frame_id {
        return WriteOutcome::Rejected(Error::PastFrame);
    }
    if resend {
        let expected = state.players[&msg.player_id].last_sequence_id + 1;
        if msg.sequence_id != expected {
            return WriteOutcome::Resend { expected };
        }
    }
    state.frame_queue.insert(msg.player_id.clone(), msg.clone());
    WriteOutcome::Accepted
}

#[allow(clippy::too_many_arguments)]
async fn run_tick(
    state: Arc<Mutex<State>>,
    processor: Arc<dyn FrameProcessor>,
    mut retune_rx: tokio::sync::watch::Receiver<f64>,
    default_fill: bool,
    delay_frames: u64,
    idle_interval: Option<Duration>,
    idle_handler: Option<Arc<dyn Fn() + Send + Sync>>,
    stop: CancellationToken,
) {
    let mut ticker = make_interval(*retune_rx.borrow());
    let mut last_idle = Instant::now();

    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            res = retune_rx.changed() => {
                if res.is_ok() {
                    ticker = make_interval(*retune_rx.borrow());
                }
                continue;
            }
            _ = ticker.tick() => {
                let to_emit = {
                    let mut state = state.lock();
                    assemble_tick(&mut state, default_fill, delay_frames)
                };

                if let Some((frame, did_work)) = to_emit {
                    processor.process(frame).await;
                    if !did_work {
                        if let Some(interval) = idle_interval {
                            if last_idle.elapsed() >= interval {
                                last_idle = Instant::now();
                                if let Some(handler) = &idle_handler {
                                    handler();
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    processor.close().await;
}

async fn run_heartbeat(processor: Arc<dyn FrameProcessor>, hz: f64, stop: CancellationToken) {
    let mut ticker = make_interval(hz);
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => return,
            _ = ticker.tick() => processor.handle_idle().await,
        }
    }
}

/// Advances the frame counter, aggregates one [`Frame`] from pending slots
/// (filling idle players' entries when `default_fill` is set), and applies
/// the delay-frames buffering policy, returning the frame ready to emit (if
/// any) this call alongside whether any player contributed a real (not
/// default-filled) message to *that* frame — tracked per-frame through the
/// delay buffer so it survives being emitted a later tick than it was
/// assembled.
fn assemble_tick(state: &mut State, default_fill: bool, delay_frames: u64) -> Option<(Frame, bool)> {
    state.current_frame_id += 1;
    let frame_id = state.current_frame_id;
    let mut frame = Frame { frame_id, inputs: HashMap::new() };
    let mut did_work = false;

    let player_ids: Vec<String> = state.players.keys().cloned().collect();
    for player_id in player_ids {
        if let Some(msg) = state.frame_queue.remove(&player_id) {
            did_work = true;
            if let Some(p) = state.players.get_mut(&player_id) {
                p.last_sequence_id = msg.sequence_id;
            }
            frame.inputs.insert(player_id, msg);
        } else if default_fill {
            frame.inputs.insert(player_id.clone(), Message::empty(player_id, frame_id));
        }
    }
    state.frame_queue.clear();

    if delay_frames == 0 {
        return Some((frame, did_work));
    }

    state.delay_buffer.insert(frame_id, (frame, did_work));
    let emit_id = frame_id.saturating_sub(delay_frames);
    if emit_id == 0 {
        return None;
    }
    state.delay_buffer.remove(&emit_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct RecordingProcessor {
        frames: AsyncMutex<Vec<Frame>>,
        resends: AsyncMutex<Vec<(String, u64)>>,
    }

    #[async_trait::async_trait]
    impl FrameProcessor for RecordingProcessor {
        async fn process(&self, frame: Frame) {
            self.frames.lock().await.push(frame);
        }
        async fn resend(&self, player_id: String, expected_sequence_id: u64) {
            self.resends.lock().await.push((player_id, expected_sequence_id));
        }
    }

    fn msg(player: &str, frame_id: u64, seq: u64) -> Message {
        Message {
            player_id: player.to_string(),
            data: Vec::new(),
            frame_id,
            sequence_id: seq,
            timestamp: std::time::SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn default_fill_produces_empty_entries_for_idle_players() {
        let recorder = Arc::new(RecordingProcessor::default());
        let lp = FrameSyncLoop::new(
            FrameSyncLoopConf { tick_hz: 100.0, default_fill: true, ..Default::default() },
            recorder.clone(),
        );
        lp.register("p1");
        lp.register("p2");
        lp.start().unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        lp.stop().await;

        let frames = recorder.frames.lock().await;
        assert!(frames.len() >= 3, "expected at least 3 ticks, saw {}", frames.len());
        for (i, frame) in frames.iter().take(3).enumerate() {
            let expected_id = (i + 1) as u64;
            assert_eq!(frame.frame_id, expected_id);
            assert_eq!(frame.inputs.len(), 2);
            for pid in ["p1", "p2"] {
                let m = &frame.inputs[pid];
                assert!(m.data.is_empty());
                assert_eq!(m.frame_id, expected_id);
            }
        }
    }

    #[tokio::test]
    async fn resend_mismatch_does_not_consume_slot() {
        let recorder = Arc::new(RecordingProcessor::default());
        let lp = FrameSyncLoop::new(
            FrameSyncLoopConf {
                tick_hz: 1000.0,
                resend: true,
                default_fill: false,
                ..Default::default()
            },
            recorder.clone(),
        );
        lp.register("p1");
        lp.set_last_sequence_id("p1", 3);

        lp.write(msg("p1", 5, 7)).await.unwrap();

        let resends = recorder.resends.lock().await;
        assert_eq!(resends.as_slice(), &[("p1".to_string(), 4)]);
        assert!(!lp.pending("p1"));
    }

    #[tokio::test]
    async fn stale_or_duplicate_and_past_frame_are_rejected() {
        let recorder = Arc::new(RecordingProcessor::default());
        let lp = FrameSyncLoop::new(FrameSyncLoopConf::default(), recorder);

        lp.register("p1");
        lp.write(msg("p1", 10, 1)).await.unwrap();
        assert_eq!(lp.write(msg("p1", 5, 2)).await.unwrap_err(), Error::StaleOrDuplicate);

        lp.set_current_frame_id(20);
        assert_eq!(lp.write(msg("p1", 15, 3)).await.unwrap_err(), Error::PastFrame);
        let _ = lp.current_frame_id();
    }

    #[tokio::test]
    async fn unregistered_sender_is_rejected() {
        let recorder = Arc::new(RecordingProcessor::default());
        let lp = FrameSyncLoop::new(FrameSyncLoopConf::default(), recorder);
        assert_eq!(lp.write(msg("ghost", 1, 1)).await.unwrap_err(), Error::NotRegistered);
    }

    #[test]
    fn assemble_tick_applies_delay() {
        let mut state = State {
            players: HashMap::from([("p1".to_string(), PlayerState::default())]),
            frame_queue: HashMap::new(),
            current_frame_id: 0,
            delay_buffer: HashMap::new(),
        };
        assert!(assemble_tick(&mut state, true, 2).is_none());
        assert!(assemble_tick(&mut state, true, 2).is_none());
        let (emitted, did_work) = assemble_tick(&mut state, true, 2).unwrap();
        assert_eq!(emitted.frame_id, 1);
        assert!(!did_work);
    }

    #[test]
    fn assemble_tick_reports_did_work_only_for_real_messages() {
        let mut state = State {
            players: HashMap::from([("p1".to_string(), PlayerState::default())]),
            frame_queue: HashMap::new(),
            current_frame_id: 0,
            delay_buffer: HashMap::new(),
        };
        let (_, did_work) = assemble_tick(&mut state, true, 0).unwrap();
        assert!(!did_work, "default-filled slots are not real work");

        state.frame_queue.insert("p1".to_string(), msg("p1", 2, 1));
        let (_, did_work) = assemble_tick(&mut state, true, 0).unwrap();
        assert!(did_work, "a real message must mark the tick as having done work");
    }

    #[tokio::test]
    async fn idle_handler_fires_under_default_fill_when_no_real_message_arrives() {
        let recorder = Arc::new(RecordingProcessor::default());
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let lp = FrameSyncLoop::new(
            FrameSyncLoopConf {
                tick_hz: 200.0,
                default_fill: true,
                idle_interval: Some(Duration::from_millis(1)),
                idle_handler: Some(Arc::new(move || {
                    fired2.store(true, Ordering::SeqCst);
                })),
                ..Default::default()
            },
            recorder.clone(),
        );
        lp.register("p1");
        lp.start().unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        lp.stop().await;

        assert!(fired.load(Ordering::SeqCst), "idle_handler must fire even though every frame is default-filled");
    }
}

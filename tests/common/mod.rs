//! Shared fixtures for channel integration tests.

#![allow(dead_code)]

use slotline::buffer::EngineBuffer;
use slotline::channel::{
    BufferChannel, ChannelConfig, ChannelEvent, Engine, EventQueue, EventReceiver, FrameData,
    Work, Worklet,
};
use slotline::error::Result;
use slotline::format::MediaKind;
use slotline::memory::{BasicBlockPool, BlockPool, BlockPoolKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Engine that records queued work and optionally blocks inside `queue`.
pub struct FakeEngine {
    name: String,
    kinds: (MediaKind, MediaKind),
    pool: Arc<dyn BlockPool>,
    queued: Mutex<Vec<Work>>,
    hold: Mutex<Option<Hold>>,
}

struct Hold {
    frame_index: u64,
    entered: kanal::Sender<()>,
    release: kanal::Receiver<()>,
}

impl FakeEngine {
    /// Audio engine with a linear block pool of `pool_capacity` bytes.
    pub fn audio(pool_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            name: "c2.fake.aac.decoder".to_string(),
            kinds: (MediaKind::Audio, MediaKind::Audio),
            pool: Arc::new(BasicBlockPool::new(pool_capacity)),
            queued: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
        })
    }

    /// Make `queue` block on `frame_index` until the returned sender fires.
    ///
    /// The first receiver yields once `queue` has been entered.
    pub fn hold_frame(&self, frame_index: u64) -> (kanal::Receiver<()>, kanal::Sender<()>) {
        let (entered_tx, entered_rx) = kanal::bounded(1);
        let (release_tx, release_rx) = kanal::bounded(1);
        *self.hold.lock().unwrap() = Some(Hold {
            frame_index,
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    /// Take every work item queued so far.
    pub fn take_queued(&self) -> Vec<Work> {
        std::mem::take(&mut *self.queued.lock().unwrap())
    }
}

impl Engine for FakeEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream_kinds(&self) -> (MediaKind, MediaKind) {
        self.kinds
    }

    fn block_pool(&self, _kind: BlockPoolKind) -> Result<Arc<dyn BlockPool>> {
        Ok(Arc::clone(&self.pool))
    }

    fn queue(&self, items: Vec<Work>) -> Result<()> {
        let hold = {
            let mut hold = self.hold.lock().unwrap();
            let hit = hold
                .as_ref()
                .is_some_and(|h| items.iter().any(|w| w.frame_index() == h.frame_index));
            if hit { hold.take() } else { None }
        };
        if let Some(hold) = hold {
            hold.entered.send(()).unwrap();
            hold.release.recv().unwrap();
        }
        self.queued.lock().unwrap().extend(items);
        Ok(())
    }
}

/// Install a test-writer subscriber once; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Channel wired to an event queue.
pub fn channel(engine: &Arc<FakeEngine>, config: ChannelConfig) -> (BufferChannel, EventReceiver) {
    init_tracing();
    let (events, receiver) = EventQueue::unbounded();
    let engine: Arc<dyn Engine> = Arc::clone(engine) as Arc<dyn Engine>;
    (BufferChannel::new(engine, Arc::new(events), config), receiver)
}

/// Complete `work` with a single output frame echoing its frame index.
pub fn complete(mut work: Work, buffers: Vec<EngineBuffer>, eos: bool) -> Work {
    let mut output = FrameData {
        frame_index: work.input.frame_index,
        timestamp: work.input.timestamp,
        buffers,
        ..Default::default()
    };
    output.flags.eos = eos;
    work.worklets = vec![Worklet { output }];
    work
}

/// Input buffer events, in order.
pub fn input_events(events: &[ChannelEvent]) -> Vec<(usize, slotline::buffer::ClientBuffer)> {
    events
        .iter()
        .filter_map(|event| match event {
            ChannelEvent::InputAvailable { index, buffer } => Some((*index, buffer.clone())),
            _ => None,
        })
        .collect()
}

/// Output buffer events, in order.
pub fn output_events(events: &[ChannelEvent]) -> Vec<(usize, slotline::buffer::ClientBuffer)> {
    events
        .iter()
        .filter_map(|event| match event {
            ChannelEvent::OutputAvailable { index, buffer } => Some((*index, buffer.clone())),
            _ => None,
        })
        .collect()
}

/// Presentation time of frame `n` at 100 frames per second.
pub fn pts(n: u64) -> Duration {
    Duration::from_millis(n * 10)
}

//! The buffer channel between a client and a codec engine.
//!
//! A [`BufferChannel`] owns one input and one output buffer strategy. It
//! hands empty input buffers to the client, turns filled ones into
//! [`Work`] for the engine, and turns completed work back into output
//! buffers for the client.
//!
//! # Lifecycle
//!
//! ```text
//! unconfigured ──configure/start──▶ running ──stop──▶ stopped
//!                                      ▲                 │
//!                                      └──────start──────┘
//! ```
//!
//! Each `stop()` moves the generation boundary to the current frame index;
//! completions for frames queued before it are dropped.
//!
//! # Threads
//!
//! The client thread, the engine completion thread and a control thread may
//! all call into the channel at once. Each direction has its own lock, the
//! kept-alive input references have another, and submissions pass through a
//! [`QueueSync`] gate so none straddles a `stop()`. Callbacks run with no
//! lock held.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotline::channel::{BufferChannel, ChannelConfig, EventQueue};
//!
//! let (events, receiver) = EventQueue::unbounded();
//! let channel = BufferChannel::new(engine, Arc::new(events), ChannelConfig::default());
//! channel.start(Some(input_format), Some(output_format))?;
//!
//! while let Some(event) = receiver.recv() {
//!     // fill input buffers, queue them, read output buffers, discard them
//! }
//! ```

mod callback;
mod config;
mod engine;
mod sync;
mod work;

pub use callback::{ChannelCallback, ChannelEvent, ErrorAction, EventQueue, EventReceiver};
pub use config::ChannelConfig;
pub use engine::{CryptoMode, DecryptRequest, Decryptor, Engine, InputSurface, OutputSurface, SubSample};
pub use sync::{QueueGuard, QueueSync};
pub use work::{ConfigUpdate, FrameData, Work, WorkResult, Worklet};

use crate::buffer::{ClientBuffer, EngineBuffer};
use crate::error::{Error, Result};
use crate::format::MediaFormat;
use crate::memory::BlockPoolKind;
use crate::metadata::{BufferFlags, Metadata};
use crate::observability::{self, ChannelMetrics, Direction};
use crate::strategy::{BufferRole, InputBuffers, InputRole, OutputBuffers, OutputRole};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::Span;

/// Output waiting for a free slot.
struct PendingOutput {
    frame_index: u64,
    payload: PendingPayload,
    timestamp: Duration,
    flags: BufferFlags,
}

enum PendingPayload {
    Csd(Bytes),
    Buffer(Option<EngineBuffer>),
}

struct OutputState {
    buffers: Option<OutputBuffers>,
    /// Outputs that could not get a slot yet, oldest first.
    pending: VecDeque<PendingOutput>,
}

struct SurfaceState {
    surface: Option<Arc<dyn OutputSurface>>,
    /// Rendered buffers the surface may still be reading.
    refs: VecDeque<EngineBuffer>,
    max_buffer_count: usize,
}

/// Brokers buffer ownership between a client and an [`Engine`].
pub struct BufferChannel {
    name: String,
    engine: Arc<dyn Engine>,
    callback: Arc<dyn ChannelCallback>,
    config: ChannelConfig,
    sync: QueueSync,
    input: Mutex<Option<InputBuffers>>,
    output: Mutex<OutputState>,
    /// Engine forms of queued input, kept alive until their work completes.
    input_refs: Mutex<HashMap<u64, EngineBuffer>>,
    output_surface: Mutex<SurfaceState>,
    input_surface: Mutex<Option<Arc<dyn InputSurface>>>,
    decryptor: Mutex<Option<Arc<dyn Decryptor>>>,
    frame_index: AtomicU64,
    first_valid_frame_index: AtomicU64,
    /// One thread at a time hands pending outputs to the client.
    draining: AtomicBool,
    /// Pending outputs may be deliverable; checked by the active drainer.
    drain_requested: AtomicBool,
    /// Input buffers were handed out by the last `start()`.
    primed: AtomicBool,
    metrics: ChannelMetrics,
    span: Span,
}

impl BufferChannel {
    /// Create an unconfigured, stopped channel for `engine`.
    pub fn new(
        engine: Arc<dyn Engine>,
        callback: Arc<dyn ChannelCallback>,
        config: ChannelConfig,
    ) -> Self {
        observability::init_metrics();
        let name = engine.name().to_string();
        Self {
            metrics: ChannelMetrics::new(&name),
            span: observability::span_channel(&name),
            output_surface: Mutex::new(SurfaceState {
                surface: None,
                refs: VecDeque::new(),
                max_buffer_count: config.max_graphic_buffer_refs,
            }),
            name,
            engine,
            callback,
            config,
            sync: QueueSync::new(),
            input: Mutex::new(None),
            output: Mutex::new(OutputState {
                buffers: None,
                pending: VecDeque::new(),
            }),
            input_refs: Mutex::new(HashMap::new()),
            input_surface: Mutex::new(None),
            decryptor: Mutex::new(None),
            frame_index: AtomicU64::new(0),
            first_valid_frame_index: AtomicU64::new(0),
            draining: AtomicBool::new(false),
            drain_requested: AtomicBool::new(false),
            primed: AtomicBool::new(false),
        }
    }

    /// Engine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel configuration.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Returns true between `start()` and `stop()`.
    pub fn is_running(&self) -> bool {
        self.sync.is_running()
    }

    /// Frame index the next queued input will get.
    pub fn frame_index(&self) -> u64 {
        self.frame_index.load(Ordering::Acquire)
    }

    /// Completions for frames below this index are dropped.
    pub fn first_valid_frame_index(&self) -> u64 {
        self.first_valid_frame_index.load(Ordering::Acquire)
    }

    /// Current input format, if the input side is configured.
    pub fn input_format(&self) -> Option<Arc<MediaFormat>> {
        self.input.lock().as_ref().map(|b| Arc::clone(b.format()))
    }

    /// Current output format, if the output side is configured.
    pub fn output_format(&self) -> Option<Arc<MediaFormat>> {
        self.output.lock().buffers.as_ref().map(|b| Arc::clone(b.format()))
    }

    /// Outputs waiting for the client to return an output buffer.
    pub fn pending_output_count(&self) -> usize {
        self.output.lock().pending.len()
    }

    /// Engine input buffers queued and not completed yet.
    pub fn in_flight_input_count(&self) -> usize {
        self.input_refs.lock().len()
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    /// Feed the engine from `surface` instead of input buffers.
    ///
    /// Takes effect at the next `start()`.
    pub fn set_input_surface(&self, surface: Arc<dyn InputSurface>) {
        *self.input_surface.lock() = Some(surface);
    }

    /// Decrypt secure input with `decryptor`.
    ///
    /// Takes effect at the next `start()` that configures the input side.
    pub fn set_decryptor(&self, decryptor: Arc<dyn Decryptor>) {
        *self.decryptor.lock() = Some(decryptor);
    }

    /// Replace the output surface and forget buffers retained for the old one.
    pub fn set_output_surface(&self, surface: Option<Arc<dyn OutputSurface>>) {
        let mut output = self.output_surface.lock();
        output.surface = surface;
        output.refs.clear();
        output.max_buffer_count = self.config.max_graphic_buffer_refs;
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Install a buffer strategy for one direction.
    pub fn configure(&self, role: BufferRole, format: MediaFormat) -> Result<()> {
        let _span = self.span.enter();
        match role {
            BufferRole::Input(role) => {
                let kind = match role {
                    InputRole::Graphic | InputRole::Passthrough => BlockPoolKind::Graphic,
                    InputRole::Linear | InputRole::EncryptedLinear { .. } => BlockPoolKind::Linear,
                };
                let pool = self.engine.block_pool(kind)?;
                let buffers = InputBuffers::new(role, format, pool, &self.config)?;
                let previous = self.input.lock().replace(buffers);
                self.trace_configured(Direction::Input, previous.is_some());
            }
            BufferRole::Output(role) => {
                let buffers = OutputBuffers::new(role, format, &self.config);
                let mut output = self.output.lock();
                let previous = output.buffers.replace(buffers);
                output.pending.clear();
                drop(output);
                self.trace_configured(Direction::Output, previous.is_some());
            }
        }
        tracing::debug!(role = ?role, "configured");
        Ok(())
    }

    fn trace_configured(&self, direction: Direction, replaced: bool) {
        let from = if replaced { "configured" } else { "unconfigured" };
        observability::trace_state_change(
            &self.name,
            &format!("{direction} {from}"),
            &format!("{direction} configured"),
        );
    }

    /// Configure the given directions, open the gate and hand out the first
    /// input buffers.
    ///
    /// Roles are chosen from the engine's stream kinds and the attached
    /// surfaces and decryptor. A direction whose format is `None` keeps its
    /// current strategy. Failing to allocate even one input buffer is fatal.
    pub fn start(
        &self,
        input_format: Option<MediaFormat>,
        output_format: Option<MediaFormat>,
    ) -> Result<()> {
        let (input_kind, output_kind) = self.engine.stream_kinds();
        let input_surface = self.input_surface.lock().clone();

        if let Some(format) = input_format {
            let role = InputRole::select(
                input_kind,
                input_surface.is_some(),
                self.decryptor.lock().is_some(),
                self.engine.is_secure(),
            );
            self.configure(BufferRole::Input(role), format)?;
        }
        if let Some(format) = output_format {
            let has_surface = self.output_surface.lock().surface.is_some();
            let role = OutputRole::select(output_kind, has_surface);
            self.configure(BufferRole::Output(role), format)?;
        }

        self.sync.start();
        observability::trace_state_change(&self.name, "stopped", "running");

        let _span = self.span.enter();
        match input_surface {
            Some(surface) => {
                if let Err(err) = surface.connect(&self.engine) {
                    tracing::warn!(error = %err, "input surface failed to connect");
                    self.callback.on_error(&err, ErrorAction::Recoverable);
                }
            }
            None => self.prime_input()?,
        }
        self.primed.store(true, Ordering::Release);
        Ok(())
    }

    fn prime_input(&self) -> Result<()> {
        for i in 0..self.config.min_buffer_array_size {
            let requested = match self.input.lock().as_mut() {
                Some(buffers) => buffers.request_new_buffer(),
                None => Err(Error::NotConfigured("input")),
            };
            match requested {
                Ok((index, buffer)) => {
                    observability::trace_slot_assigned(&self.name, Direction::Input, index);
                    self.callback.on_input_buffer_available(index, buffer);
                }
                Err(err) if i == 0 => {
                    tracing::error!(error = %err, "cannot allocate any input buffer");
                    self.sync.stop();
                    return Err(match err {
                        Error::NotConfigured(_) => err,
                        other => Error::AllocationFailed(format!(
                            "no input buffer could be allocated: {other}"
                        )),
                    });
                }
                Err(err) => {
                    tracing::debug!(allocated = i, error = %err, "stopped priming input");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Close the gate and wait for in-flight submissions.
    ///
    /// Work queued before this point is stale once it completes. Slots stay
    /// valid for release and flush.
    pub fn stop(&self) {
        let _span = self.span.enter();
        self.sync.stop();
        self.primed.store(false, Ordering::Release);
        let boundary = self.frame_index.load(Ordering::Acquire);
        self.first_valid_frame_index.store(boundary, Ordering::Release);
        let dropped = std::mem::take(&mut self.output.lock().pending).len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped parked outputs");
        }
        if let Some(surface) = self.input_surface.lock().take() {
            surface.disconnect();
        }
        observability::trace_state_change(&self.name, "running", "stopped");
        tracing::debug!(first_valid = boundary, "generation boundary moved");
    }

    /// Forget every buffer the client holds in either direction.
    ///
    /// `flushed` is the work the engine discarded. Held buffers can still be
    /// discarded, but no new input buffer is handed out until `start()`.
    pub fn flush(&self, flushed: &[Work]) {
        let _span = self.span.enter();
        if let Some(buffers) = self.input.lock().as_mut() {
            buffers.flush();
        }
        {
            let mut output = self.output.lock();
            if let Some(buffers) = output.buffers.as_mut() {
                buffers.flush(flushed);
            }
            output.pending.clear();
        }
        {
            let mut refs = self.input_refs.lock();
            for work in flushed {
                refs.remove(&work.frame_index());
            }
        }
        self.primed.store(false, Ordering::Release);
        tracing::debug!(flushed = flushed.len(), "flushed");
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Get an empty input buffer.
    ///
    /// Exhaustion ([`Error::PoolExhausted`], [`Error::NoSlotAvailable`]) means
    /// the client should wait for a buffer to come back.
    pub fn request_new_input_buffer(&self) -> Result<(usize, ClientBuffer)> {
        if !self.sync.is_running() || !self.primed.load(Ordering::Acquire) {
            return Err(Error::NotRunning);
        }
        let requested = match self.input.lock().as_mut() {
            Some(buffers) => buffers.request_new_buffer(),
            None => Err(Error::NotConfigured("input")),
        };
        match &requested {
            Ok((index, _)) => {
                observability::trace_slot_assigned(&self.name, Direction::Input, *index)
            }
            Err(err) if err.is_transient() => self.metrics.record_exhausted(),
            Err(_) => {}
        }
        requested
    }

    fn feed_input_buffer_if_available(&self) {
        match self.request_new_input_buffer() {
            Ok((index, buffer)) => self.callback.on_input_buffer_available(index, buffer),
            Err(err) => tracing::trace!(error = %err, "no new input buffer available"),
        }
    }

    /// Submit a filled input buffer to the engine.
    ///
    /// The buffer needs a timestamp. Its end-of-stream and codec-config
    /// flags carry over to the work item.
    pub fn queue_input_buffer(&self, buffer: &ClientBuffer) -> Result<()> {
        let guard = QueueGuard::new(&self.sync);
        if !guard.is_running() {
            tracing::warn!("no more buffers should be queued at current state");
            return Err(Error::NotRunning);
        }
        self.queue_input_internal(buffer)
    }

    /// Decrypt an encrypted input buffer in place, then submit it.
    pub fn queue_secure_input_buffer(
        &self,
        buffer: &ClientBuffer,
        request: &DecryptRequest,
    ) -> Result<()> {
        let guard = QueueGuard::new(&self.sync);
        if !guard.is_running() {
            tracing::warn!("no more buffers should be queued at current state");
            return Err(Error::NotRunning);
        }
        let decryptor = self
            .decryptor
            .lock()
            .clone()
            .ok_or(Error::NotConfigured("decryptor"))?;
        let (block, region) = buffer
            .encrypted_parts()
            .ok_or_else(|| Error::InvalidArgument("not an encrypted input buffer".into()))?;

        let range = buffer.offset()..buffer.offset() + buffer.size();
        let written = region.map(|src| {
            block.map_mut(|dst| decryptor.decrypt(request, &src[range.clone()], dst))
        })?;
        tracing::trace!(written, "decrypted input");

        buffer.set_range(0, written)?;
        self.queue_input_internal(buffer)
    }

    fn queue_input_internal(&self, buffer: &ClientBuffer) -> Result<()> {
        let _span = self.span.enter();
        let meta = buffer.metadata();
        let timestamp = meta
            .pts
            .ok_or_else(|| Error::InvalidArgument("input buffer has no timestamp".into()))?;
        let flags = BufferFlags {
            eos: meta.flags.eos,
            codec_config: meta.flags.codec_config,
            sync_frame: false,
        };

        let (frame_index, engine_buffer) = {
            let mut input = self.input.lock();
            let buffers = input.as_mut().ok_or(Error::NotConfigured("input"))?;
            let engine_buffer = buffers.release_buffer(buffer)?;
            let frame_index = self.frame_index.fetch_add(1, Ordering::AcqRel);
            if let Some(engine_buffer) = &engine_buffer {
                self.input_refs
                    .lock()
                    .insert(frame_index, engine_buffer.clone());
            }
            (frame_index, engine_buffer)
        };
        observability::trace_slot_released(&self.name, Direction::Input);

        let work = Work::new(FrameData {
            flags,
            timestamp,
            frame_index,
            buffers: engine_buffer.into_iter().collect(),
            config_update: Vec::new(),
        });
        if let Err(err) = self.engine.queue(vec![work]) {
            self.input_refs.lock().remove(&frame_index);
            return Err(err);
        }
        self.metrics.record_input_queued();
        tracing::trace!(frame = frame_index, eos = flags.eos, "queued input");
        Ok(())
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Handle work the engine has completed.
    pub fn on_work_done(&self, items: impl IntoIterator<Item = Work>) {
        let _span = self.span.enter();
        for work in items {
            self.handle_work_done(work);
        }
    }

    fn handle_work_done(&self, work: Work) {
        let input_frame = work.frame_index();
        if self.input_refs.lock().remove(&input_frame).is_some() {
            tracing::trace!(frame = input_frame, "released input ref");
        }

        match work.result {
            WorkResult::Ok => {}
            WorkResult::NotFound => {
                tracing::debug!(frame = input_frame, "flushed work; ignored");
                return;
            }
            WorkResult::Failed(code) => {
                tracing::debug!(frame = input_frame, code, "work failed to complete");
                self.report_fatal(Error::EngineFailed(code));
                return;
            }
        }

        let mut worklets = work.worklets;
        if worklets.len() != 1 {
            self.report_fatal(Error::ProtocolViolation(format!(
                "expected one worklet, got {}",
                worklets.len()
            )));
            return;
        }
        let output = worklets.swap_remove(0).output;

        if self.is_stale(output.frame_index) {
            self.metrics.record_stale_dropped();
            observability::trace_stale_work(
                &self.name,
                output.frame_index,
                self.first_valid_frame_index(),
            );
            return;
        }

        if output.buffers.len() > 1 {
            self.report_fatal(Error::ProtocolViolation(format!(
                "expected at most one output buffer, got {}",
                output.buffers.len()
            )));
            return;
        }

        let csd = output.csd().cloned();
        let timestamp = output.timestamp;
        let mut flags = BufferFlags {
            eos: output.flags.eos,
            ..BufferFlags::NONE
        };
        let buffer = output.buffers.into_iter().next();

        if let Some(csd) = csd {
            tracing::trace!(frame = output.frame_index, len = csd.len(), "csd found");
            let delivered = self.deliver(PendingOutput {
                frame_index: output.frame_index,
                payload: PendingPayload::Csd(csd),
                timestamp,
                flags: flags.union(BufferFlags::codec_config()),
            });
            if !delivered {
                return;
            }
        }

        if buffer.is_none() && flags.is_empty() {
            tracing::trace!(frame = output.frame_index, "not reporting output buffer");
            return;
        }
        if buffer.as_ref().is_some_and(|b| b.info().key_frame) {
            flags.sync_frame = true;
        }
        self.deliver(PendingOutput {
            frame_index: output.frame_index,
            payload: PendingPayload::Buffer(buffer),
            timestamp,
            flags,
        });
    }

    fn is_stale(&self, frame_index: u64) -> bool {
        let first_valid = self.first_valid_frame_index.load(Ordering::Acquire);
        (frame_index.wrapping_sub(first_valid) as i64) < 0
    }

    /// Queue `output` behind earlier pending outputs and deliver what fits.
    ///
    /// Returns false if a fatal error was reported.
    fn deliver(&self, output: PendingOutput) -> bool {
        self.output.lock().pending.push_back(output);
        self.drain_pending_outputs()
    }

    /// Register pending outputs in order until one cannot get a slot.
    ///
    /// Only one thread drains at a time, so callbacks fire in output order.
    /// A call that finds a drain in progress leaves the work to that drain,
    /// including calls made from inside a callback.
    ///
    /// Returns false if a fatal error was reported.
    fn drain_pending_outputs(&self) -> bool {
        self.drain_requested.store(true, Ordering::Release);
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return true;
            }
            let mut healthy = true;
            while healthy && self.drain_requested.swap(false, Ordering::AcqRel) {
                healthy = self.drain_pending_once();
            }
            self.draining.store(false, Ordering::Release);
            if !healthy {
                return false;
            }
            if !self.drain_requested.load(Ordering::Acquire) {
                return true;
            }
        }
    }

    fn drain_pending_once(&self) -> bool {
        loop {
            let registered = {
                let mut output = self.output.lock();
                let OutputState { buffers, pending } = &mut *output;
                let Some(next) = pending.pop_front() else {
                    return true;
                };
                if self.is_stale(next.frame_index) {
                    self.metrics.record_stale_dropped();
                    observability::trace_stale_work(
                        &self.name,
                        next.frame_index,
                        self.first_valid_frame_index(),
                    );
                    continue;
                }
                let result = match buffers.as_mut() {
                    Some(buffers) => register_output(buffers, &next),
                    None => Err(Error::NotConfigured("output")),
                };
                match result {
                    Err(err) if err.is_transient() => {
                        pending.push_front(next);
                        let parked = pending.len();
                        drop(output);
                        self.metrics.record_exhausted();
                        tracing::debug!(
                            error = %err,
                            pending = parked,
                            "output parked until a buffer is returned"
                        );
                        return true;
                    }
                    other => other,
                }
            };

            match registered {
                Ok((index, buffer)) => {
                    observability::trace_slot_assigned(&self.name, Direction::Output, index);
                    self.metrics.record_output_delivered();
                    self.callback.on_output_buffer_available(index, buffer);
                }
                Err(err) => {
                    self.report_fatal(err);
                    return false;
                }
            }
        }
    }

    fn report_fatal(&self, error: Error) {
        observability::trace_fatal(&self.name, &error);
        self.callback.on_error(&error, ErrorAction::Fatal);
    }

    /// Show an output buffer on the output surface.
    ///
    /// The buffer must hold exactly one image. Rendered buffers stay alive
    /// for `max_graphic_buffer_refs + 1` further renders.
    pub fn render_output_buffer(&self, buffer: &ClientBuffer, timestamp_ns: i64) -> Result<()> {
        let _span = self.span.enter();
        self.feed_input_buffer_if_available();

        let released = match self.output.lock().buffers.as_mut() {
            Some(buffers) => buffers.release_buffer(buffer)?,
            None => return Err(Error::NotConfigured("output")),
        };
        observability::trace_slot_released(&self.name, Direction::Output);
        self.drain_pending_outputs();

        let Some(surface) = self.output_surface.lock().surface.clone() else {
            tracing::error!("no surface");
            return Ok(());
        };
        let engine_buffer = released
            .filter(|b| b.single_graphic().is_some())
            .ok_or_else(|| {
                Error::ProtocolViolation("expected exactly one graphic block to render".into())
            })?;

        surface.queue_buffer(&engine_buffer, timestamp_ns)?;
        let mut output = self.output_surface.lock();
        if !output
            .surface
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &surface))
        {
            tracing::debug!("surface replaced while rendering; not retaining buffer");
            return Ok(());
        }
        output.refs.push_back(engine_buffer);
        while output.refs.len() > output.max_buffer_count + 1 {
            output.refs.pop_front();
        }
        tracing::trace!(retained = output.refs.len(), "rendered output");
        Ok(())
    }

    /// Return a buffer the client no longer needs.
    ///
    /// Unknown buffers are ignored. Returning an output buffer hands a new
    /// input buffer to the client when one is available.
    pub fn discard_buffer(&self, buffer: &ClientBuffer) {
        let _span = self.span.enter();
        let input_released = self
            .input
            .lock()
            .as_mut()
            .is_some_and(|b| is_released(b.release_buffer(buffer)));
        if input_released {
            observability::trace_slot_released(&self.name, Direction::Input);
        }

        let output_released = self
            .output
            .lock()
            .buffers
            .as_mut()
            .is_some_and(|b| is_released(b.release_buffer(buffer)));
        if output_released {
            observability::trace_slot_released(&self.name, Direction::Output);
            self.feed_input_buffer_if_available();
            self.drain_pending_outputs();
        } else if !input_released {
            tracing::debug!("discarded buffer is not tracked");
        }
    }

    // ========================================================================
    // Array mode
    // ========================================================================

    /// Fixed input buffer array, converting the input side on first call.
    pub fn input_buffer_array(&self) -> Result<Vec<ClientBuffer>> {
        let mut input = self.input.lock();
        let buffers = input.as_mut().ok_or(Error::NotConfigured("input"))?;
        if !buffers.is_array_mode() {
            buffers.to_array_mode(self.config.min_buffer_array_size)?;
        }
        Ok(buffers.buffer_array().unwrap_or_default())
    }

    /// Fixed output buffer array, converting the output side on first call.
    pub fn output_buffer_array(&self) -> Result<Vec<ClientBuffer>> {
        let mut output = self.output.lock();
        let buffers = output
            .buffers
            .as_mut()
            .ok_or(Error::NotConfigured("output"))?;
        if !buffers.is_array_mode() {
            buffers.to_array_mode(self.config.min_buffer_array_size)?;
        }
        Ok(buffers.buffer_array().unwrap_or_default())
    }
}

/// A slot was given back, even if its engine form could not be built.
fn is_released(result: Result<Option<EngineBuffer>>) -> bool {
    match result {
        Ok(_) => true,
        Err(Error::UnknownBuffer) => false,
        Err(err) => {
            tracing::warn!(error = %err, "returned buffer has no usable engine form");
            true
        }
    }
}

fn register_output(
    buffers: &mut OutputBuffers,
    output: &PendingOutput,
) -> Result<(usize, ClientBuffer)> {
    let (index, client) = match &output.payload {
        PendingPayload::Csd(data) => buffers.register_csd(data)?,
        PendingPayload::Buffer(buffer) => buffers.register_buffer(buffer.clone())?,
    };
    client.set_metadata(Metadata {
        pts: Some(output.timestamp),
        flags: output.flags,
    });
    Ok((index, client))
}

impl std::fmt::Debug for BufferChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferChannel")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("frame_index", &self.frame_index())
            .field("first_valid_frame_index", &self.first_valid_frame_index())
            .finish()
    }
}

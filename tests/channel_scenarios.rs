//! End-to-end channel scenarios against a fake engine.
//!
//! These tests verify that:
//! - Input exhaustion is transient backpressure, not a fatal error
//! - End of stream without payload still reaches the client exactly once
//! - `stop()` waits for a submission already admitted and refuses later ones
//! - `flush()` leaves input unprimed until the next `start()`
//! - Outputs parked for a free slot do not survive `stop()`
//! - Outputs reach the client in order while both threads drain

mod common;

use common::{FakeEngine, channel, complete, input_events, output_events, pts};
use slotline::buffer::{EngineBuffer, LinearView};
use slotline::channel::{ChannelConfig, ChannelEvent, Work};
use slotline::error::Error;
use slotline::format::MediaFormat;
use slotline::memory::LinearBlock;
use slotline::metadata::Metadata;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const KB: usize = 1024;

fn audio() -> MediaFormat {
    MediaFormat::audio("audio/mp4a-latm")
}

fn pcm() -> MediaFormat {
    MediaFormat::audio("audio/raw")
}

#[test]
fn test_seventeenth_input_buffer_is_backpressure() {
    let engine = FakeEngine::audio(16 * 512 * KB);
    let (channel, events) = channel(&engine, ChannelConfig::default());
    channel.start(Some(audio()), Some(pcm())).unwrap();

    let primed = input_events(&events.drain());
    assert_eq!(primed.len(), 16);
    assert!(primed.iter().all(|(_, b)| b.capacity() == 512 * KB));

    let err = channel.request_new_input_buffer().unwrap_err();
    assert_eq!(err, Error::PoolExhausted);
    assert!(err.is_transient());
    assert!(!err.is_fatal());
    assert!(events.is_empty(), "exhaustion must not reach the error callback");

    // Once a buffer is discarded and dropped, its memory is handed out again.
    let (_, returned) = primed[0].clone();
    channel.discard_buffer(&returned);
    drop(returned);
    drop(primed);
    let (index, buffer) = channel.request_new_input_buffer().unwrap();
    assert_eq!(index, 0);
    assert_eq!(buffer.capacity(), 512 * KB);
}

#[test]
fn test_eos_without_payload_is_delivered_once() {
    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new()
        .with_min_buffer_array_size(4)
        .with_linear_buffer_size(4 * KB);
    let (channel, events) = channel(&engine, config);
    channel.start(Some(audio()), Some(pcm())).unwrap();

    let (_, buffer) = input_events(&events.drain()).remove(0);
    buffer.set_range(0, 0).unwrap();
    buffer.set_metadata(Metadata::new().with_pts(pts(0)).with_eos());
    channel.queue_input_buffer(&buffer).unwrap();

    let mut queued = engine.take_queued();
    assert_eq!(queued.len(), 1);
    let work = queued.remove(0);
    assert_eq!(work.frame_index(), 0);
    assert!(work.input.flags.eos);

    channel.on_work_done([complete(work, Vec::new(), true)]);

    let delivered = events.drain();
    assert_eq!(delivered.len(), 1);
    let outputs = output_events(&delivered);
    assert_eq!(outputs.len(), 1);
    let (_, eos) = &outputs[0];
    assert!(eos.metadata().flags.eos);
    assert_eq!(eos.metadata().pts, Some(pts(0)));
    assert_eq!(eos.size(), 0);
    assert_eq!(channel.in_flight_input_count(), 0);
}

#[test]
fn test_stop_waits_for_admitted_submission() {
    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new()
        .with_min_buffer_array_size(8)
        .with_linear_buffer_size(KB);
    let (channel, events) = channel(&engine, config);
    let channel = Arc::new(channel);
    channel.start(Some(audio()), Some(pcm())).unwrap();

    let mut buffers = input_events(&events.drain()).into_iter().map(|(_, b)| b);
    for n in 0..5 {
        let buffer = buffers.next().unwrap();
        buffer.set_metadata(Metadata::new().with_pts(pts(n)));
        channel.queue_input_buffer(&buffer).unwrap();
    }

    // Frame 5 enters the engine and stays there.
    let (entered, release) = engine.hold_frame(5);
    let fifth = buffers.next().unwrap();
    fifth.set_metadata(Metadata::new().with_pts(pts(5)));
    let submitter = {
        let channel = Arc::clone(&channel);
        let fifth = fifth.clone();
        std::thread::spawn(move || channel.queue_input_buffer(&fifth))
    };
    entered.recv().unwrap();

    let stopped = Arc::new(AtomicBool::new(false));
    let stopper = {
        let channel = Arc::clone(&channel);
        let stopped = Arc::clone(&stopped);
        std::thread::spawn(move || {
            channel.stop();
            stopped.store(true, Ordering::SeqCst);
        })
    };

    std::thread::sleep(Duration::from_millis(50));
    assert!(!stopped.load(Ordering::SeqCst), "stop returned during submission");

    release.send(()).unwrap();
    submitter.join().unwrap().unwrap();
    stopper.join().unwrap();
    assert!(stopped.load(Ordering::SeqCst));
    assert_eq!(engine.take_queued().len(), 6);
    assert_eq!(channel.first_valid_frame_index(), 6);

    let late = buffers.next().unwrap();
    late.set_metadata(Metadata::new().with_pts(pts(6)));
    assert_eq!(channel.queue_input_buffer(&late).unwrap_err(), Error::NotRunning);
    assert_eq!(channel.request_new_input_buffer().unwrap_err(), Error::NotRunning);
}

#[test]
fn test_flush_needs_start_to_reprime() {
    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new()
        .with_min_buffer_array_size(4)
        .with_linear_buffer_size(4 * KB);
    let (channel, events) = channel(&engine, config);
    channel.start(Some(audio()), Some(pcm())).unwrap();

    let held = input_events(&events.drain());
    for (n, (_, buffer)) in held.iter().take(2).enumerate() {
        buffer.set_metadata(Metadata::new().with_pts(pts(n as u64)));
        channel.queue_input_buffer(buffer).unwrap();
    }
    assert_eq!(channel.in_flight_input_count(), 2);

    let flushed = engine.take_queued();
    channel.flush(&flushed);
    drop(flushed);
    assert_eq!(channel.in_flight_input_count(), 0);

    assert_eq!(channel.request_new_input_buffer().unwrap_err(), Error::NotRunning);

    // Buffers the client still holds can be discarded without effect.
    for (_, buffer) in &held {
        channel.discard_buffer(buffer);
    }
    assert!(events.is_empty());

    channel.start(None, None).unwrap();
    let reprimed = input_events(&events.drain());
    assert_eq!(reprimed.len(), 4);
    assert_eq!(
        reprimed.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    assert!(reprimed.iter().all(|(_, b)| held.iter().all(|(_, h)| !b.ptr_eq(h))));
    assert!(channel.request_new_input_buffer().is_ok());
}

#[test]
fn test_restart_drops_previous_generation() {
    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new()
        .with_min_buffer_array_size(4)
        .with_linear_buffer_size(KB);
    let (channel, events) = channel(&engine, config);
    channel.start(Some(audio()), Some(pcm())).unwrap();

    let (_, buffer) = input_events(&events.drain()).remove(0);
    buffer.fill(b"old").unwrap();
    buffer.set_metadata(Metadata::new().with_pts(pts(0)));
    channel.queue_input_buffer(&buffer).unwrap();
    let old_work = engine.take_queued().remove(0);

    channel.stop();
    channel.start(None, None).unwrap();
    let (_, buffer) = input_events(&events.drain()).remove(0);
    buffer.fill(b"new").unwrap();
    buffer.set_metadata(Metadata::new().with_pts(pts(1)));
    channel.queue_input_buffer(&buffer).unwrap();
    let new_work = engine.take_queued().remove(0);
    assert_eq!(new_work.frame_index(), 1);

    let old_output = old_work.input.buffers.clone();
    let new_output = new_work.input.buffers.clone();
    channel.on_work_done([
        complete(old_work, old_output, false),
        complete(new_work, new_output, false),
    ]);

    let outputs = output_events(&events.drain());
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].1.to_vec(), b"new");
}

#[test]
fn test_fatal_engine_failure_reaches_client() {
    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new().with_min_buffer_array_size(2);
    let (channel, events) = channel(&engine, config);
    channel.start(Some(audio()), Some(pcm())).unwrap();
    events.drain();

    let work = slotline::channel::Work {
        result: slotline::channel::WorkResult::Failed(-12),
        ..Default::default()
    };
    channel.on_work_done([work]);

    match events.try_recv() {
        Some(ChannelEvent::Error { error, action }) => {
            assert_eq!(error, Error::EngineFailed(-12));
            assert_eq!(action, slotline::channel::ErrorAction::Fatal);
        }
        other => panic!("expected fatal error, got {other:?}"),
    }
}

fn payload(byte: u8) -> Vec<EngineBuffer> {
    vec![EngineBuffer::linear(LinearView::full(LinearBlock::from_slice(&[byte])))]
}

#[test]
fn test_parked_outputs_do_not_cross_restart() {
    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new()
        .with_min_buffer_array_size(4)
        .with_linear_buffer_size(KB);
    let (channel, events) = channel(&engine, config);
    channel.start(Some(audio()), Some(pcm())).unwrap();
    assert_eq!(channel.output_buffer_array().unwrap().len(), 4);

    let mut inputs: Vec<_> = input_events(&events.drain())
        .into_iter()
        .map(|(_, b)| b)
        .collect();
    while inputs.len() < 6 {
        inputs.push(channel.request_new_input_buffer().unwrap().1);
    }
    for (n, buffer) in inputs.iter().enumerate() {
        buffer.set_metadata(Metadata::new().with_pts(pts(n as u64)));
        channel.queue_input_buffer(buffer).unwrap();
    }

    let done: Vec<_> = engine
        .take_queued()
        .into_iter()
        .map(|work| {
            let byte = work.frame_index() as u8;
            complete(work, payload(byte), false)
        })
        .collect();
    channel.on_work_done(done);

    let delivered = output_events(&events.drain());
    assert_eq!(delivered.len(), 4);
    assert_eq!(channel.pending_output_count(), 2);

    channel.stop();
    assert_eq!(channel.pending_output_count(), 0);
    channel.start(None, None).unwrap();
    assert_eq!(channel.first_valid_frame_index(), 6);
    events.drain();

    // A free slot must not pull frames 4 and 5 across the boundary.
    channel.discard_buffer(&delivered[0].1);
    assert!(output_events(&events.drain()).is_empty());
    assert_eq!(channel.pending_output_count(), 0);
}

#[test]
fn test_outputs_stay_ordered_across_threads() {
    const FRAMES: u8 = 200;

    let engine = FakeEngine::audio(1 << 20);
    let config = ChannelConfig::new()
        .with_min_buffer_array_size(4)
        .with_linear_buffer_size(KB);
    let (channel, events) = channel(&engine, config);
    let channel = Arc::new(channel);
    channel.start(Some(audio()), Some(pcm())).unwrap();
    channel.output_buffer_array().unwrap();
    events.drain();

    let producer = {
        let channel = Arc::clone(&channel);
        std::thread::spawn(move || {
            for n in 0..FRAMES {
                let mut work = Work::default();
                work.input.frame_index = u64::from(n);
                work.input.timestamp = pts(u64::from(n));
                channel.on_work_done([complete(work, payload(n), false)]);
            }
        })
    };

    let mut seen = Vec::with_capacity(FRAMES as usize);
    while seen.len() < FRAMES as usize {
        match events.recv() {
            Some(ChannelEvent::OutputAvailable { buffer, .. }) => {
                seen.push(buffer.to_vec()[0]);
                channel.discard_buffer(&buffer);
            }
            Some(_) => {}
            None => break,
        }
    }
    producer.join().unwrap();

    assert_eq!(seen, (0..FRAMES).collect::<Vec<_>>());
    assert_eq!(channel.pending_output_count(), 0);
}

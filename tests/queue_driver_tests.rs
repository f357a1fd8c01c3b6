//! Threaded producers feeding a driven merge engine.

use std::cell::RefCell;
use std::thread;
use std::time::Duration;
use tandem::item::ItemTiming;
use tandem::prelude::*;

fn ms(v: u64) -> ClockTime {
    ClockTime::from_millis(v)
}

/// A queue receiver whose producer delivers one last item and finishes
/// right after the first empty `peek`, before the reader asks whether the
/// queue is exhausted.
struct LateFinishReceiver {
    rx: QueueReceiver<u32>,
    tx: QueueSender<u32>,
    last: RefCell<Option<Item<u32>>>,
}

impl LateFinishReceiver {
    fn new(capacity: usize, last: Item<u32>) -> (QueueSender<u32>, Self) {
        let (tx, rx) = item_queue(capacity);
        let receiver = Self {
            rx,
            tx: tx.clone(),
            last: RefCell::new(Some(last)),
        };
        (tx, receiver)
    }
}

impl Channel for LateFinishReceiver {
    type Payload = u32;

    fn peek(&self) -> Option<ItemTiming> {
        let timing = self.rx.peek();
        if timing.is_none() {
            if let Some(item) = self.last.borrow_mut().take() {
                self.tx.push(item).unwrap();
                self.tx.finish();
            }
        }
        timing
    }

    fn pop(&mut self) -> Option<Item<u32>> {
        self.rx.pop()
    }

    fn is_exhausted(&self) -> bool {
        self.rx.is_exhausted()
    }

    fn take_segment(&mut self) -> Option<TimeSegment> {
        self.rx.take_segment()
    }
}

#[test]
fn test_threaded_producers_with_small_queues() {
    let (video_tx, video_rx) = item_queue::<u64>(2);
    let (cc_tx, cc_rx) = item_queue::<u64>(2);
    let config = MergeConfig::from_frame_rate(25, 1).unwrap().with_name("threaded");
    let engine = MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), config).unwrap();
    let mut driver = Driver::new(engine, DriverConfig::default().with_live(false));

    let video = thread::spawn(move || {
        for n in 0..100u64 {
            video_tx.push(Item::at(ms(n * 40), n)).unwrap();
        }
        video_tx.finish();
    });
    let cc = thread::spawn(move || {
        for n in 0..100u64 {
            cc_tx.push(Item::at(ms(n * 40 + 10), n)).unwrap();
        }
        cc_tx.finish();
    });

    assert_eq!(driver.run().unwrap(), 100);
    video.join().unwrap();
    cc.join().unwrap();

    let engine = driver.into_engine();
    for (n, frame) in engine.emitter().frames().iter().enumerate() {
        assert_eq!(frame.primary.payload, n as u64);
        let matched: Vec<u64> = frame.matched.iter().map(|i| i.payload).collect();
        assert_eq!(matched, vec![n as u64]);
    }
    assert_eq!(engine.stats().eos_fallbacks, 1);
}

#[test]
fn test_in_band_segment_applies_to_later_items() {
    let (video_tx, video_rx) = item_queue::<u32>(8);
    let (cc_tx, cc_rx) = item_queue::<u32>(8);
    let config = MergeConfig::new(ms(40));
    let mut engine = MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), config).unwrap();

    for n in 0..4u64 {
        video_tx
            .push(Item::at(ms(n * 40), n as u32).with_duration(ms(40)))
            .unwrap();
    }
    video_tx.finish();

    // local 10 maps to running 10 before the update and to 90 after it
    cc_tx.push(Item::at(ms(10), 0)).unwrap();
    cc_tx
        .push_segment(TimeSegment::new().with_offset(ms(80)))
        .unwrap();
    cc_tx.push(Item::at(ms(10), 1)).unwrap();
    cc_tx.finish();

    while engine.step(false) == StepResult::Progress {}

    let frames = engine.emitter().frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0].matched[0].payload, 0);
    assert!(frames[1].matched.is_empty());
    assert_eq!(frames[2].matched[0].payload, 1);
    assert_eq!(engine.segment(ChannelId::Auxiliary).offset, ms(80));
}

#[test]
fn test_invalid_in_band_segment_halts() {
    let (video_tx, video_rx) = item_queue::<u32>(8);
    let (cc_tx, cc_rx) = item_queue::<u32>(8);
    let engine =
        MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), MergeConfig::new(ms(40))).unwrap();
    let mut driver = Driver::new(engine, DriverConfig::default());

    video_tx.push_segment(TimeSegment::new().with_rate(0.0)).unwrap();
    video_tx.push(Item::at(ms(0), 0)).unwrap();
    cc_tx.finish();

    let err = driver.run().unwrap_err();
    assert_eq!(
        err,
        Error::UnsupportedRate {
            channel: Some(ChannelId::Primary),
            rate: 0.0
        }
    );
    assert_eq!(driver.engine().state(), MergeState::Halted);
}

#[test]
fn test_live_driver_does_not_stall_on_silent_auxiliary() {
    let (video_tx, video_rx) = item_queue::<u32>(8);
    let (_cc_tx, cc_rx) = item_queue::<u32>(8);
    let engine =
        MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), MergeConfig::new(ms(40))).unwrap();
    let mut driver = Driver::new(
        engine,
        DriverConfig::default().with_latency(Duration::from_millis(5)),
    );

    for n in 0..3u64 {
        video_tx.push(Item::at(ms(n * 40), n as u32)).unwrap();
    }
    video_tx.finish();

    assert_eq!(driver.run().unwrap(), 3);
    assert_eq!(driver.engine().stats().timeouts, 3);
}

#[test]
fn test_late_auxiliary_after_timeout_is_stale() {
    let (video_tx, video_rx) = item_queue::<u32>(8);
    let (cc_tx, cc_rx) = item_queue::<u32>(8);
    let engine =
        MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), MergeConfig::new(ms(40))).unwrap();
    let mut driver = Driver::new(
        engine,
        DriverConfig::default().with_latency(Duration::from_millis(5)),
    );

    video_tx.push(Item::at(ms(0), 0).with_duration(ms(40))).unwrap();
    assert_eq!(driver.step_blocking(), StepResult::Progress);

    cc_tx.push(Item::at(ms(20), 7)).unwrap();
    cc_tx.finish();
    video_tx.push(Item::at(ms(40), 1).with_duration(ms(40))).unwrap();
    video_tx.finish();

    assert_eq!(driver.run().unwrap(), 1);
    let engine = driver.into_engine();
    assert_eq!(engine.stats().aux_dropped_stale, 1);
    assert!(engine.emitter().frames().iter().all(|f| f.matched.is_empty()));
}

#[test]
fn test_flush_queues_and_engine() {
    let (video_tx, video_rx) = item_queue::<u32>(8);
    let (cc_tx, cc_rx) = item_queue::<u32>(8);
    let mut engine =
        MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), MergeConfig::new(ms(40))).unwrap();

    video_tx.push(Item::at(ms(0), 0)).unwrap();
    cc_tx.push(Item::at(ms(10), 0)).unwrap();
    assert_eq!(engine.step(false), StepResult::NeedMore);

    video_tx.set_flushing(true);
    cc_tx.set_flushing(true);
    assert_eq!(video_tx.push(Item::at(ms(40), 1)), Err(Error::Flushing));
    video_tx.flush();
    cc_tx.flush();
    engine.flush();
    video_tx.set_flushing(false);
    cc_tx.set_flushing(false);

    assert!(engine.auxiliary().is_empty());
    assert_eq!(engine.pending_interval(), None);

    video_tx.push(Item::at(ms(0), 2).with_duration(ms(40))).unwrap();
    video_tx.finish();
    cc_tx.finish();
    assert_eq!(engine.step(false), StepResult::Progress);
    assert_eq!(engine.emitter().frames()[0].primary.payload, 2);
}

#[test]
fn test_primary_finishing_between_peek_and_eos_check() {
    let (video_tx, video_rx) = LateFinishReceiver::new(8, Item::at(ms(10), 1));
    let (cc_tx, cc_rx) = item_queue::<u32>(8);
    let mut engine =
        MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), MergeConfig::new(ms(40))).unwrap();

    video_tx.push(Item::at(ms(0), 0)).unwrap();
    cc_tx.finish();

    // the successor of the first frame arrives together with end of stream
    assert_eq!(engine.step(false), StepResult::NeedMore);
    assert_eq!(engine.step(false), StepResult::Progress);
    assert_eq!(engine.previous_end(), Some(ms(10)));
    assert_eq!(engine.stats().eos_fallbacks, 0);

    assert_eq!(engine.step(false), StepResult::Progress);
    assert_eq!(engine.step(false), StepResult::Eos);

    let frames = engine.emitter().frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].primary.payload, 0);
    assert_eq!(frames[1].primary.payload, 1);
    assert_eq!(engine.stats().eos_fallbacks, 1);
}

#[test]
fn test_auxiliary_finishing_between_peek_and_eos_check() {
    let (video_tx, video_rx) = item_queue::<u32>(8);
    let (_cc_tx, cc_rx) = LateFinishReceiver::new(8, Item::at(ms(20), 7));
    let mut engine =
        MergeEngine::new(video_rx, cc_rx, FrameCollector::new(), MergeConfig::new(ms(40))).unwrap();

    video_tx.push(Item::at(ms(0), 0).with_duration(ms(40))).unwrap();
    video_tx.finish();

    assert_eq!(engine.step(false), StepResult::NeedMore);
    assert_eq!(engine.step(false), StepResult::Progress);
    assert_eq!(engine.step(false), StepResult::Eos);

    let frames = engine.emitter().frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].matched[0].payload, 7);
    assert_eq!(engine.stats().aux_dropped_stale, 0);
}

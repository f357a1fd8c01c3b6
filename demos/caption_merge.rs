//! # Caption Merge
//!
//! Merges a sparse caption stream onto 25 fps video frames.
//!
//! ```text
//! [video thread] --frames---> +--------+
//!                             | Driver | --> [print emitter]
//! [caption thread] --cc-----> +--------+
//! ```
//!
//! The caption producer starts late, sends a packet that is already stale,
//! then announces an empty stretch with a gap item.
//!
//! Run: `cargo run --example caption_merge`

use std::thread;
use std::time::Duration;
use tandem::prelude::*;

fn main() -> Result<()> {
    // Initialize tracing to see drops and timeouts
    tracing_subscriber::fmt()
        .with_env_filter("tandem=debug")
        .init();
    tandem::observability::init_metrics();

    println!("=== Caption Merge Example ===\n");

    let (video_tx, video_rx) = item_queue::<u32>(4);
    let (cc_tx, cc_rx) = item_queue::<String>(4);

    let emitter = |frame: Item<u32>, captions: Vec<Item<String>>| -> std::result::Result<(), EmitError> {
        let ts = frame.timestamp.unwrap_or(ClockTime::ZERO);
        let text: Vec<String> = captions
            .iter()
            .map(|c| {
                if c.is_gap {
                    format!("<gap {}>", c.duration.unwrap_or(ClockTime::ZERO))
                } else {
                    c.payload.clone()
                }
            })
            .collect();
        println!("  frame {:>3} @ {}  {:?}", frame.payload, ts, text);
        Ok(())
    };

    let config = MergeConfig::from_frame_rate(25, 1)?.with_name("caption-merge");
    let engine = MergeEngine::new(video_rx, cc_rx, emitter, config)?;
    let mut driver = Driver::new(
        engine,
        DriverConfig::default().with_latency(Duration::from_millis(20)),
    );

    let video = thread::spawn(move || -> Result<()> {
        for n in 0..20u64 {
            video_tx.push(Item::at(ClockTime::from_millis(n * 40), n as u32))?;
            thread::sleep(Duration::from_millis(10));
        }
        video_tx.finish();
        Ok(())
    });

    let captions = thread::spawn(move || -> Result<()> {
        thread::sleep(Duration::from_millis(80));
        cc_tx.push(Item::at(ClockTime::from_millis(5), "too late".to_string()))?;
        for (ms, text) in [(200, "HELLO"), (210, "WORLD"), (400, "CAPTIONS")] {
            cc_tx.push(Item::at(ClockTime::from_millis(ms), text.to_string()))?;
        }
        cc_tx.push(Item::gap(
            ClockTime::from_millis(440),
            ClockTime::from_millis(200),
        ))?;
        cc_tx.finish();
        Ok(())
    });

    let frames = driver.run()?;
    video.join().expect("video thread panicked")?;
    captions.join().expect("caption thread panicked")?;

    let stats = driver.engine().stats();
    println!("\nEmitted {} frames", frames);
    println!("  captions matched: {}", stats.aux_matched);
    println!("  gaps recorded:    {}", stats.aux_gaps);
    println!("  stale dropped:    {}", stats.aux_dropped_stale);
    println!("  live timeouts:    {}", stats.timeouts);

    Ok(())
}

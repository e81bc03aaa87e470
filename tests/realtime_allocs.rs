//! Renders a moving scrub with the allocation checking allocator installed.

use std::sync::Arc;

use phonic_scrub::{BufferScrubDecoder, Scrubber, ScrubberOptions};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SOURCE_SAMPLE_RATE: u32 = 44100;
const OUTPUT_SAMPLE_RATE: u32 = 48000;
const BLOCK_SIZE: usize = 512;

#[test]
fn scrub_without_mixer_allocations() {
    let samples = (0..SOURCE_SAMPLE_RATE as usize * 10)
        .map(|frame| (frame as f32 * 440.0 / SOURCE_SAMPLE_RATE as f32 * 6.283).sin())
        .collect::<Vec<_>>();
    let decoder = BufferScrubDecoder::new(Arc::new(samples), SOURCE_SAMPLE_RATE, 1).unwrap();
    let mut scrubber = Scrubber::new(
        decoder,
        OUTPUT_SAMPLE_RATE,
        1,
        1.0,
        ScrubberOptions::default(),
    )
    .unwrap();
    let handle = scrubber.handle();
    handle.set_is_scrubbing(true);

    #[cfg(debug_assertions)]
    assert_no_alloc::reset_violation_count();

    let mut block = vec![0.0; BLOCK_SIZE];
    let mut max_active_grains = 0;
    let mut is_audible = false;
    for index in 0..400 {
        // drag forward, pause, then drag backwards quickly
        let playhead = match index {
            0..=149 => 1.0 + index as f64 * 0.01,
            150..=199 => 2.5,
            _ => 2.5 - (index - 200) as f64 * 0.02,
        };
        handle.set_playhead_time(playhead);

        block.fill(0.0);
        scrubber.render_audio(&mut block);
        max_active_grains = max_active_grains.max(scrubber.active_grain_count());
        is_audible |= block.iter().any(|s| *s != 0.0);
    }

    #[cfg(debug_assertions)]
    assert_eq!(assert_no_alloc::violation_count(), 0);

    assert!(is_audible);
    assert!(max_active_grains <= ScrubberOptions::default().max_active_grains);
    assert!(scrubber.chunk_count() <= 8, "chunks: {}", scrubber.chunk_count());
}

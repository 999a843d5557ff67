//! Sample playback: resampling, looping, one-shot clamping.

mod helpers;

use helpers::*;
use std::sync::Arc;
use voce::prelude::*;
use voce::{LoopMode, SamplePromise};

fn sample_region(id: &str, frames: u64) -> Region {
    let mut region = Region::new(0, id);
    region.pitch_keycenter = 60;
    region.sample_end = frames;
    region
}

#[test]
fn playback_follows_the_source() {
    let (mut voice, mut resources) = test_rig();
    load_ramp(&resources, "ramp", 48_000, 48_000.0);

    let region = sample_region("ramp", 48_000);
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    // Warm up the gain smoother, then check the cursor tracks 1:1.
    render_blocks(&mut voice, &resources, 4);
    let position = voice.source_position();
    assert!(
        (position as i64 - 4 * BLOCK_SIZE as i64).abs() <= 1,
        "unity pitch advances one frame per frame, at {}",
        position
    );
}

#[test]
fn transposed_note_advances_faster() {
    let (mut voice, mut resources) = test_rig();
    load_ramp(&resources, "ramp", 48_000, 48_000.0);

    let region = sample_region("ramp", 48_000);
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        // One octave above the keycenter: double speed.
        TriggerEvent::note_on(72, 1.0),
    );

    render_blocks(&mut voice, &resources, 4);
    let position = voice.source_position() as i64;
    let expected = 2 * 4 * BLOCK_SIZE as i64;
    assert!(
        (position - expected).abs() <= 2,
        "octave doubles the rate: {} vs {}",
        position,
        expected
    );
}

#[test]
fn sample_rate_mismatch_scales_speed() {
    let (mut voice, mut resources) = test_rig();
    // A 96 kHz source played on a 48 kHz engine runs 2x.
    load_ramp(&resources, "hires", 96_000, 96_000.0);

    let region = sample_region("hires", 96_000);
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    render_blocks(&mut voice, &resources, 4);
    let position = voice.source_position() as i64;
    let expected = 2 * 4 * BLOCK_SIZE as i64;
    assert!((position - expected).abs() <= 2, "got {}", position);
}

#[test]
fn loop_keeps_cursor_inside_loop_points() {
    let (mut voice, mut resources) = test_rig();
    load_ramp(&resources, "looped", 1_000, 48_000.0);

    let mut region = sample_region("looped", 1_000);
    region.loop_mode = LoopMode::Continuous;
    region.loop_start = 100;
    region.loop_end = 200;
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    // Render far longer than the loop; the cursor must never escape.
    for _ in 0..100 {
        render_block(&mut voice, &resources, BLOCK_SIZE);
        let position = voice.source_position();
        assert!(position <= 200, "cursor {} outside the loop", position);
    }
    assert_eq!(voice.state(), VoiceState::Playing, "looped voices sustain");
}

#[test]
fn one_shot_clamp_releases_and_cleans_up() {
    let (mut voice, mut resources) = test_rig();
    // 100 frames of full-scale DC so the clamp is audible.
    resources
        .file_pool
        .insert_memory("short", SampleData::mono(vec![1.0; 100], 48_000.0));

    let mut region = sample_region("short", 100);
    region.loop_mode = LoopMode::OneShot;
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    // The cursor crosses the end inside the first block; the zero-length
    // release finishes the envelope in the same block.
    render_block(&mut voice, &resources, BLOCK_SIZE);
    assert_eq!(voice.state(), VoiceState::CleanMeUp);

    let (left, _) = render_block(&mut voice, &resources, BLOCK_SIZE);
    assert!(is_silent(&left), "clamped voice tails to silence");
}

#[test]
fn one_shot_clamp_pins_cursor_to_sample_end() {
    let (mut voice, mut resources) = test_rig();
    resources
        .file_pool
        .insert_memory("short", SampleData::mono(vec![0.5; 128], 48_000.0));

    let mut region = sample_region("short", 128);
    region.loop_mode = LoopMode::OneShot;
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    render_blocks(&mut voice, &resources, 3);
    assert_eq!(voice.source_position(), 127, "cursor clamps at end - 1");
}

#[test]
fn stereo_source_keeps_channels_distinct() {
    let (mut voice, mut resources) = test_rig();
    resources.file_pool.insert_memory(
        "wide",
        SampleData::stereo(vec![0.8; 48_000], vec![-0.8; 48_000], 48_000.0),
    );

    let mut region = sample_region("wide", 48_000);
    region.stereo = true;
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    render_blocks(&mut voice, &resources, 8);
    let (left, right) = render_block(&mut voice, &resources, BLOCK_SIZE);
    assert!(left.iter().all(|&x| x > 0.0), "left stays positive");
    assert!(right.iter().all(|&x| x < 0.0), "right stays negative");
}

#[test]
fn oversampled_promise_scales_loop_points() {
    let (mut voice, mut resources) = test_rig();
    // 2x oversampled source: 2000 stored frames for 1000 region frames.
    let data: Vec<f32> = (0..2_000).map(|i| i as f32 / 2_000.0).collect();
    resources.file_pool.insert_memory(
        "oversampled",
        SampleData::new(vec![data.into_boxed_slice()], 96_000.0, 2),
    );

    let mut region = sample_region("oversampled", 1_000);
    region.loop_mode = LoopMode::Continuous;
    region.loop_start = 100;
    region.loop_end = 400;
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    // Stored-frame loop range is [200, 800]; the 2x promise rate cancels
    // the 2x frame scale, so playback still loops and stays in range.
    for _ in 0..50 {
        render_block(&mut voice, &resources, BLOCK_SIZE);
        let position = voice.source_position();
        assert!(position <= 800, "cursor {} outside oversampled loop", position);
    }
}

#[test]
fn quality_selection_prefers_region_override() {
    let (mut voice, mut resources) = test_rig();
    load_ramp(&resources, "ramp", 4_096, 48_000.0);

    let mut region = sample_region("ramp", 4_096);
    region.sample_quality = Some(1);
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );

    assert_eq!(voice.current_sample_quality(&resources), 1);

    voice.reset();
    let plain = Arc::new(sample_region("ramp", 4_096));
    voice.start_voice(&mut resources, &plain, 0, TriggerEvent::note_on(60, 1.0));
    assert_eq!(
        voice.current_sample_quality(&resources),
        resources.synth_config.current_sample_quality()
    );
}

#[test]
fn promise_data_is_shared_not_copied() {
    let (mut voice, mut resources) = test_rig();
    load_ramp(&resources, "ramp", 4_096, 48_000.0);

    let before: SamplePromise = resources.file_pool.get_file_promise("ramp").unwrap();
    let region = sample_region("ramp", 4_096);
    voice.start_voice(
        &mut resources,
        &Arc::new(region),
        0,
        TriggerEvent::note_on(60, 1.0),
    );
    render_block(&mut voice, &resources, BLOCK_SIZE);

    let after = resources.file_pool.get_file_promise("ramp").unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

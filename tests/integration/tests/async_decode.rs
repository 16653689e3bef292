//! Integration tests for background decoding
//!
//! These tests verify:
//! - Drop-on-full submission
//! - Single delivery of every result
//! - Dispose waiting for an in-flight decode
//! - Pixel consistency of async results

use anyhow::Result;
use std::time::Duration;

use h2md_player::native::SyntheticMovie;
use h2md_player::player::{DecodeMode, MovieState};
use h2md_player::{ImageFormat, PlayerError};
use h2md_player_integration_tests::{
    assert_shows_frame, async_options, synthetic_controller, two_frame_movie, wait_for_image, wait_until, TestFixture,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_two_frame_movie_async() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, _) = synthetic_controller(async_options());
    let movie = two_frame_movie();

    let surface = controller.open(&fixture.movies.two_frames).expect("movie should open");
    assert_eq!(controller.state(), MovieState::Ready(DecodeMode::Async));

    controller.decode(0)?;
    wait_for_image(&mut controller)?;
    assert_shows_frame(&surface, &movie, 0, ImageFormat::Rgba);

    controller.decode(1)?;
    wait_for_image(&mut controller)?;
    assert_shows_frame(&surface, &movie, 1, ImageFormat::Rgba);

    // the submission itself succeeds; the failure arrives with the result
    controller.decode(2)?;
    assert!(matches!(wait_for_image(&mut controller), Err(PlayerError::InvalidArgument)));
    assert_shows_frame(&surface, &movie, 1, ImageFormat::Rgba);
    Ok(())
}

#[test]
fn test_submission_while_pending_is_dropped() -> Result<()> {
    let (mut controller, probe) = synthetic_controller(async_options());
    controller.open_from_memory(SyntheticMovie::new(2, 2, 10).encode()).expect("movie should open");
    probe.set_decode_delay(Duration::from_millis(100));

    controller.decode(3)?;
    controller.decode(7)?;
    wait_for_image(&mut controller)?;

    assert_eq!(probe.decode_log(), vec![3]);
    let stats = controller.stats();
    assert_eq!(stats.decodes_requested, 1);
    assert_eq!(stats.submissions_dropped, 1);
    Ok(())
}

#[test]
fn test_result_is_delivered_once() -> Result<()> {
    let (mut controller, _) = synthetic_controller(async_options());
    let surface = controller.open_from_memory(SyntheticMovie::new(2, 2, 4).encode()).expect("movie should open");

    controller.decode(2)?;
    wait_for_image(&mut controller)?;
    let revision = surface.read().revision();

    assert!(!controller.is_ready_get_image());
    controller.get_image()?;
    controller.get_image()?;
    assert_eq!(surface.read().revision(), revision);
    assert_eq!(controller.stats().images_transferred, 1);
    Ok(())
}

#[test]
fn test_dispose_waits_for_in_flight_decode() -> Result<()> {
    let (mut controller, probe) = synthetic_controller(async_options());
    controller.open_from_memory(SyntheticMovie::new(2, 2, 4).encode()).expect("movie should open");
    probe.set_decode_delay(Duration::from_millis(200));

    controller.decode(1)?;
    wait_until(TIMEOUT, || probe.in_flight() > 0);
    controller.dispose();

    assert_eq!(probe.finished_decodes(), 1);
    assert_eq!(probe.in_flight(), 0);
    assert_eq!(probe.destroyed_while_busy(), 0);
    assert_eq!(probe.live_handles(), 0);
    Ok(())
}

#[test]
fn test_dispose_waits_for_unclaimed_request() -> Result<()> {
    let (mut controller, probe) = synthetic_controller(async_options());
    controller.open_from_memory(SyntheticMovie::new(2, 2, 4).encode()).expect("movie should open");
    probe.set_decode_delay(Duration::from_millis(50));

    // dispose right away, possibly before the worker has picked the request up
    controller.decode(0)?;
    controller.dispose();

    assert_eq!(probe.decode_log(), vec![0]);
    assert_eq!(probe.finished_decodes(), 1);
    assert_eq!(probe.destroyed_while_busy(), 0);
    Ok(())
}

#[test]
fn test_engine_calls_never_overlap() -> Result<()> {
    let (mut controller, probe) = synthetic_controller(async_options());
    let movie = SyntheticMovie::new(8, 8, 30);
    let surface = controller.open_from_memory(movie.encode()).expect("movie should open");

    for tick in 0..300 {
        controller.decode(tick % 30)?;
        controller.get_image()?;
        let shown = surface.read();
        if let Some(frame) = shown.frame() {
            assert_eq!(shown.pixel(0, 0), Some([frame as u8, 0, 0, 0xff]));
        }
    }
    controller.dispose();

    assert_eq!(probe.overlapping_calls(), 0);
    assert_eq!(probe.destroyed_while_busy(), 0);
    Ok(())
}

#[test]
fn test_mode_is_fixed_once_worker_runs() -> Result<()> {
    let (mut controller, _) = synthetic_controller(async_options());
    controller.open_from_memory(two_frame_movie().encode()).expect("movie should open");

    controller.decode(0)?;
    assert!(matches!(controller.set_async_mode(false), Err(PlayerError::InvalidState)));

    // a reopen tears the worker down, so switching works again
    controller.open_from_memory(two_frame_movie().encode()).expect("movie should reopen");
    controller.set_async_mode(false)?;
    assert_eq!(controller.state(), MovieState::Ready(DecodeMode::Sync));
    Ok(())
}

#[test]
fn test_switch_to_async_before_first_decode() -> Result<()> {
    let (mut controller, _) = synthetic_controller(Default::default());
    let movie = two_frame_movie();
    let surface = controller.open_from_memory(movie.encode()).expect("movie should open");

    controller.set_async_mode(true)?;
    assert!(!controller.is_ready_get_image());
    controller.decode(1)?;
    wait_until(TIMEOUT, || controller.is_ready_get_image());
    controller.get_image()?;
    assert_shows_frame(&surface, &movie, 1, ImageFormat::Rgba);
    Ok(())
}

#[test]
fn test_negative_frame_is_rejected() {
    let (mut controller, probe) = synthetic_controller(async_options());
    controller.open_from_memory(two_frame_movie().encode()).expect("movie should open");

    assert!(matches!(controller.decode(-1), Err(PlayerError::InvalidArgument)));
    assert!(probe.decode_log().is_empty());
}

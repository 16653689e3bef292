//! Integration tests for the movie controller
//!
//! These tests verify:
//! - Opening movies from files and from memory
//! - Synchronous decode and image transfer
//! - Error propagation from the native engine
//! - Dispose and reopen behaviour

use anyhow::Result;
use std::sync::Arc;

use h2md_player::native::SyntheticMovie;
use h2md_player::player::{DecodeMode, MovieState};
use h2md_player::{ControllerOptions, ImageFormat, MovieController, PlayerError, Status};
use h2md_player_integration_tests::mock_engine::{fake_handle, opening_engine, small_info, MockEngine};
use h2md_player_integration_tests::{assert_shows_frame, synthetic_controller, two_frame_movie, TestFixture};

#[test]
fn test_two_frame_movie_end_to_end() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, _) = synthetic_controller(ControllerOptions::default());
    let movie = two_frame_movie();

    let surface = controller.open(&fixture.movies.two_frames).expect("movie should open");
    assert_eq!((surface.read().width(), surface.read().height()), (4, 3));
    assert_eq!(controller.state(), MovieState::Ready(DecodeMode::Sync));

    controller.decode(0)?;
    controller.get_image()?;
    assert_shows_frame(&surface, &movie, 0, ImageFormat::Rgba);

    controller.decode(1)?;
    controller.get_image()?;
    assert_shows_frame(&surface, &movie, 1, ImageFormat::Rgba);

    assert!(matches!(controller.decode(2), Err(PlayerError::InvalidArgument)));
    assert_shows_frame(&surface, &movie, 1, ImageFormat::Rgba);

    Ok(())
}

#[test]
fn test_every_frame_in_sync_mode() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, probe) = synthetic_controller(ControllerOptions {
        image_format: ImageFormat::Bgra,
        ..Default::default()
    });
    let movie = h2md_player_integration_tests::long_alpha_movie();

    let surface = controller.open(&fixture.movies.long_alpha).expect("movie should open");
    for frame in 0..movie.total_frames as i32 {
        controller.decode(frame)?;
        controller.get_image()?;
        assert_shows_frame(&surface, &movie, frame, ImageFormat::Bgra);
    }

    assert_eq!(probe.overlapping_calls(), 0);
    assert_eq!(controller.stats().images_transferred, 60);
    Ok(())
}

#[test]
fn test_open_from_memory() -> Result<()> {
    let (mut controller, _) = synthetic_controller(ControllerOptions::default());
    let movie = SyntheticMovie::new(5, 5, 3);

    let surface = controller.open_from_memory(movie.encode()).expect("movie should open");
    controller.decode(2)?;
    controller.get_image()?;
    assert_shows_frame(&surface, &movie, 2, ImageFormat::Rgba);
    Ok(())
}

#[test]
fn test_movie_metadata() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, _) = synthetic_controller(ControllerOptions::default());

    controller.open(&fixture.movies.long_alpha).expect("movie should open");
    let info = controller.movie_info().expect("info after open");
    assert!(info.has_alpha());
    assert_eq!(controller.total_frames(), 60);
    assert!((controller.frame_rate() - 29.97).abs() < 0.01);

    controller.open(&fixture.movies.two_frames).expect("movie should open");
    assert_eq!(controller.frame_rate(), 30.0);
    Ok(())
}

#[test]
fn test_open_failures_return_none() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, probe) = synthetic_controller(ControllerOptions::default());

    assert!(controller.open(&fixture.movies.broken).is_none());
    assert!(controller.open(&fixture.path().join("missing.h2md")).is_none());
    assert!(matches!(
        controller.try_open(&fixture.movies.future_version),
        Err(PlayerError::InvalidVersion)
    ));
    assert!(matches!(
        controller.try_open(&fixture.movies.broken),
        Err(PlayerError::BrokenData)
    ));

    assert_eq!(controller.state(), MovieState::Unopened);
    assert_eq!(probe.live_handles(), 0);
    assert!(matches!(controller.get_image(), Err(PlayerError::InvalidState)));
    Ok(())
}

#[test]
fn test_calls_after_dispose_are_state_errors() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, probe) = synthetic_controller(ControllerOptions::default());

    controller.open(&fixture.movies.two_frames).expect("movie should open");
    controller.decode(0)?;
    controller.dispose();

    assert_eq!(controller.state(), MovieState::Disposed);
    assert!(matches!(controller.decode(0), Err(PlayerError::InvalidState)));
    assert!(matches!(controller.get_image(), Err(PlayerError::InvalidState)));
    assert!(!controller.is_ready_get_image());
    assert_eq!(controller.frame_rate(), 1.0);
    assert_eq!(probe.live_handles(), 0);

    controller.dispose();
    assert_eq!(probe.live_handles(), 0);
    Ok(())
}

#[test]
fn test_reopen_after_dispose() -> Result<()> {
    let fixture = TestFixture::new()?;
    let (mut controller, probe) = synthetic_controller(ControllerOptions::default());

    controller.open(&fixture.movies.two_frames).expect("movie should open");
    controller.dispose();
    let surface = controller.open(&fixture.movies.two_frames).expect("movie should reopen");

    controller.decode(1)?;
    controller.get_image()?;
    assert_shows_frame(&surface, &two_frame_movie(), 1, ImageFormat::Rgba);
    assert_eq!(probe.live_handles(), 1);
    Ok(())
}

#[test]
fn test_reopen_with_new_dimensions_shows_new_pixels() -> Result<()> {
    let (mut controller, probe) = synthetic_controller(ControllerOptions::default());
    let small = SyntheticMovie::new(2, 2, 3);
    let wide = SyntheticMovie::new(8, 4, 5);

    let surface = controller.open_from_memory(small.encode()).expect("small movie should open");
    controller.decode(1)?;
    controller.get_image()?;
    assert_shows_frame(&surface, &small, 1, ImageFormat::Rgba);

    let surface = controller.open_from_memory(wide.encode()).expect("wide movie should open");
    assert_eq!((surface.read().width(), surface.read().height()), (8, 4));
    controller.decode(4)?;
    controller.get_image()?;
    assert_shows_frame(&surface, &wide, 4, ImageFormat::Rgba);

    assert_eq!(probe.live_handles(), 1);
    Ok(())
}

#[test]
fn test_create_failure_is_reported() {
    let mut engine = MockEngine::new();
    engine
        .expect_create()
        .times(1)
        .returning(|_, _| Err(Status::OUT_OF_MEMORY));
    engine.expect_destroy().times(0);

    let mut controller = MovieController::new(Arc::new(engine));
    let err = controller.try_open_from_memory(vec![0u8; 8]).unwrap_err();
    assert!(matches!(err, PlayerError::OutOfMemory));
    assert_eq!(err.status(), Status::OUT_OF_MEMORY);
    assert_eq!(controller.state(), MovieState::Unopened);
}

#[test]
fn test_info_failure_destroys_handle() {
    let mut engine = MockEngine::new();
    engine.expect_create().returning(|_, _| Ok(fake_handle()));
    engine.expect_open_memory().returning(|_, _| Status::SUCCESS);
    engine
        .expect_movie_info()
        .returning(|_, _| Err(Status::INVALID_VERSION));
    engine.expect_destroy().times(1).return_const(());

    let mut controller = MovieController::new(Arc::new(engine));
    assert!(controller.open_from_memory(vec![0u8; 8]).is_none());
    assert!(matches!(controller.decode(0), Err(PlayerError::InvalidState)));
}

#[test]
fn test_native_status_propagates_unchanged() {
    let mut engine = opening_engine(4);
    engine.expect_decode().returning(|_, index| match index {
        0 => Status::SUCCESS,
        _ => Status::from_raw(42),
    });

    let mut controller = MovieController::new(Arc::new(engine));
    controller.open_from_memory(vec![0u8; 8]).expect("mock movie should open");

    assert!(controller.decode(0).is_ok());
    let err = controller.decode(1).unwrap_err();
    assert!(matches!(err, PlayerError::Other(42)));
    assert_eq!(err.status().code(), 42);
}

#[test]
fn test_fetch_failure_leaves_surface_untouched() {
    let mut engine = opening_engine(1);
    engine.expect_decode().returning(|_, _| Status::SUCCESS);
    engine
        .expect_fetch_image()
        .returning(|_, _, _| Status::BROKEN_DATA);

    let mut controller = MovieController::new(Arc::new(engine));
    let surface = controller.open_from_memory(vec![0u8; 8]).expect("mock movie should open");
    assert_eq!(surface.read().width(), small_info(1).width);

    controller.decode(0).expect("decode succeeds");
    assert!(matches!(controller.get_image(), Err(PlayerError::BrokenData)));
    assert_eq!(surface.read().revision(), 0);
}

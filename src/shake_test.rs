use super::*;
use geometry::Viewport;

fn square(x: f64) -> Feature {
    Feature::from_coords("a", vec![vec![vec![[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0]]]])
}

fn viewport() -> Viewport {
    Viewport { pan_x: 0.0, pan_y: 0.0, zoom: 100.0 }
}

fn ring(feature: &Feature) -> &Vec<Position> {
    &feature.geometry.as_ref().unwrap().coordinates[0][0]
}

#[tokio::test(start_paused = true)]
async fn run_ends_on_snapped_feature() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(0.1));
    let (preview, watcher) = watch::channel(original.clone());
    let (_cancel_tx, mut cancel) = watch::channel(false);
    let started = tokio::time::Instant::now();

    let result = ShakeAnimation::new(4, Duration::from_millis(40))
        .with_seed(7)
        .run(&viewport, &original, &snapped, &preview, &mut cancel)
        .await;

    assert_eq!(result, Some(snapped.clone()));
    assert_eq!(*watcher.borrow(), snapped);
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test(start_paused = true)]
async fn intermediate_frame_interpolates_without_jitter() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(1.0));
    let (preview, mut watcher) = watch::channel(original.clone());
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let animation = ShakeAnimation::new(2, Duration::from_millis(40)).with_jitter(0.0);
    let run = animation.run(&viewport, &original, &snapped, &preview, &mut cancel);
    let observe = async {
        let mut frames = Vec::new();
        while frames.len() < 2 && watcher.changed().await.is_ok() {
            frames.push(watcher.borrow_and_update().clone());
        }
        frames
    };
    let (result, frames) = tokio::join!(run, observe);

    assert_eq!(result, Some(snapped.clone()));
    assert_eq!(frames.len(), 2);
    assert_eq!(ring(&frames[0])[0], [0.5, 0.0]);
    assert_eq!(ring(&frames[0])[2], [1.5, 1.0]);
    assert_eq!(frames[1], snapped);
}

#[tokio::test(start_paused = true)]
async fn jitter_stays_within_radius() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(1.0));
    let (preview, mut watcher) = watch::channel(original.clone());
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let animation = ShakeAnimation::new(2, Duration::from_millis(40)).with_jitter(2.0).with_seed(42);
    let run = animation.run(&viewport, &original, &snapped, &preview, &mut cancel);
    let observe = async {
        let Ok(()) = watcher.changed().await else {
            panic!("preview closed");
        };
        watcher.borrow_and_update().clone()
    };
    let (_, frame) = tokio::join!(run, observe);

    // Half way through the wobble is at most 1px, 0.01 degrees at this zoom.
    let expected = [[0.5, 0.0], [1.5, 0.0], [1.5, 1.0], [0.5, 1.0], [0.5, 0.0]];
    for (actual, expected) in ring(&frame).iter().zip(expected) {
        assert!((actual[0] - expected[0]).abs() <= 0.010_001, "{actual:?}");
        assert!((actual[1] - expected[1]).abs() <= 0.010_001, "{actual:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_restores_original() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(0.1));
    let (preview, watcher) = watch::channel(original.clone());
    let (cancel_tx, mut cancel) = watch::channel(false);

    let run = ShakeAnimation::new(10, Duration::from_millis(40))
        .with_seed(1)
        .run(&viewport, &original, &snapped, &preview, &mut cancel);
    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send(true).unwrap();
    };
    let (result, ()) = tokio::join!(run, canceller);

    assert!(result.is_none());
    assert_eq!(*watcher.borrow(), original);
}

#[tokio::test(start_paused = true)]
async fn false_cancel_signal_is_ignored() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(0.1));
    let (preview, _watcher) = watch::channel(original.clone());
    let (cancel_tx, mut cancel) = watch::channel(false);

    let run = ShakeAnimation::new(3, Duration::from_millis(40)).run(&viewport, &original, &snapped, &preview, &mut cancel);
    let nudger = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel_tx.send(false).unwrap();
    };
    let (result, ()) = tokio::join!(run, nudger);
    assert_eq!(result, Some(snapped));
}

#[tokio::test(start_paused = true)]
async fn already_cancelled_resolves_immediately() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(0.1));
    let (preview, watcher) = watch::channel(snapped.clone());
    let (_cancel_tx, mut cancel) = watch::channel(true);
    let started = tokio::time::Instant::now();

    let result = ShakeAnimation::new(5, Duration::from_millis(40))
        .run(&viewport, &original, &snapped, &preview, &mut cancel)
        .await;

    assert!(result.is_none());
    assert_eq!(*watcher.borrow(), original);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn dropped_cancel_sender_still_finishes() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(0.1));
    let (preview, _watcher) = watch::channel(original.clone());
    let (cancel_tx, mut cancel) = watch::channel(false);
    drop(cancel_tx);

    let result = ShakeAnimation::new(3, Duration::from_millis(40))
        .run(&viewport, &original, &snapped, &preview, &mut cancel)
        .await;
    assert_eq!(result, Some(snapped));
}

#[test]
fn zero_steps_become_one() {
    let animation = ShakeAnimation::new(0, Duration::from_millis(1));
    assert_eq!(animation.steps, 1);
}

#[test]
fn zero_interval_is_raised_to_minimum() {
    let animation = ShakeAnimation::new(3, Duration::ZERO);
    assert_eq!(animation.interval, MIN_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_run_still_finishes() {
    let viewport = viewport();
    let (original, snapped) = (square(0.0), square(0.1));
    let (preview, watcher) = watch::channel(original.clone());
    let (_cancel_tx, mut cancel) = watch::channel(false);

    let config = EditorConfig { shake_steps: 3, shake_interval_ms: 0, ..EditorConfig::default() };
    let result = ShakeAnimation::from_config(&config).run(&viewport, &original, &snapped, &preview, &mut cancel).await;

    assert_eq!(result, Some(snapped.clone()));
    assert_eq!(*watcher.borrow(), snapped);
}

#[test]
fn from_config_uses_shake_settings() {
    let config = EditorConfig { shake_steps: 9, shake_interval_ms: 15, ..EditorConfig::default() };
    let animation = ShakeAnimation::from_config(&config);
    assert_eq!(animation.steps, 9);
    assert_eq!(animation.interval, Duration::from_millis(15));
}

use std::{
    io::Cursor,
    sync::{Arc, Mutex},
};

use logomark::{
    Bitmap, Compositor, ExportOptions, ExportProgress, ExportStatus, LogoAsset, LogoVariant,
    LogomarkError, LogomarkResult, SourceImage, export_with_compositor,
};

fn tiny_bitmap(width: u32) -> Bitmap {
    Bitmap {
        width,
        height: 1,
        rgba8_premul: Arc::new([10u8, 20, 30, 255].repeat(width as usize)),
    }
}

fn ready_images(count: usize) -> Vec<SourceImage> {
    (0..count)
        .map(|i| SourceImage::ready(format!("src_{i}.png"), tiny_bitmap(1)))
        .collect()
}

fn ready_logo() -> LogoAsset {
    LogoAsset::ready(LogoVariant::Light, tiny_bitmap(2))
}

/// Records the progress counter observed at every composite call. Progress
/// only advances between chunks, so the set of observed values exposes the
/// join points.
struct RecordingCompositor {
    progress: ExportProgress,
    seen: Mutex<Vec<usize>>,
    invocations: Mutex<usize>,
}

impl RecordingCompositor {
    fn new(progress: ExportProgress) -> Self {
        Self {
            progress,
            seen: Mutex::new(Vec::new()),
            invocations: Mutex::new(0),
        }
    }

    fn invocations(&self) -> usize {
        *self.invocations.lock().unwrap()
    }
}

impl Compositor for RecordingCompositor {
    fn composite(&self, _image: &Bitmap, _logo: &Bitmap) -> LogomarkResult<Vec<u8>> {
        self.seen.lock().unwrap().push(self.progress.completed());
        *self.invocations.lock().unwrap() += 1;
        Ok(vec![0xaa, 0xbb])
    }
}

/// Fails on any bitmap wider than one pixel; the marker for a bad image.
struct FailingCompositor;

impl Compositor for FailingCompositor {
    fn composite(&self, image: &Bitmap, _logo: &Bitmap) -> LogomarkResult<Vec<u8>> {
        if image.width > 1 {
            return Err(LogomarkError::composite("simulated encode failure"));
        }
        Ok(vec![0x01])
    }
}

#[test]
fn chunked_export_joins_at_chunk_boundaries_only() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let images = ready_images(250);
    let logo = ready_logo();
    let progress = ExportProgress::new();
    let compositor = RecordingCompositor::new(progress.clone());
    let opts = ExportOptions {
        chunk_size: 90,
        threads: Some(4),
    };

    let archive = export_with_compositor(&compositor, &images, &logo, &opts, &progress).unwrap();

    // Every composite in chunk k ran while the counter showed k * 90, never
    // an intermediate value.
    let seen = compositor.seen.lock().unwrap();
    assert_eq!(seen.len(), 250);
    assert_eq!(seen.iter().filter(|&&v| v == 0).count(), 90);
    assert_eq!(seen.iter().filter(|&&v| v == 90).count(), 90);
    assert_eq!(seen.iter().filter(|&&v| v == 180).count(), 70);
    assert!(seen.iter().all(|&v| matches!(v, 0 | 90 | 180)));

    assert_eq!(progress.completed(), 250);
    assert_eq!(progress.total(), 250);
    assert!(!progress.is_loading());
    assert_eq!(progress.status(), ExportStatus::Succeeded);

    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(zip.len(), 250);
    assert!(zip.by_name("image_1.jpg").is_ok());
    assert!(zip.by_name("image_250.jpg").is_ok());
}

#[test]
fn export_with_no_images_is_not_ready_and_composites_nothing() {
    let progress = ExportProgress::new();
    let compositor = RecordingCompositor::new(progress.clone());

    let err = export_with_compositor(
        &compositor,
        &[],
        &ready_logo(),
        &ExportOptions::default(),
        &progress,
    )
    .unwrap_err();

    assert!(matches!(err, LogomarkError::NotReady(_)));
    assert_eq!(compositor.invocations(), 0);
    assert_eq!(progress.status(), ExportStatus::Idle);
    assert!(!progress.is_loading());
}

#[test]
fn export_with_unready_logo_is_not_ready() {
    let progress = ExportProgress::new();
    let compositor = RecordingCompositor::new(progress.clone());
    let images = ready_images(3);

    for logo in [
        LogoAsset::unset(LogoVariant::Dark),
        LogoAsset::failed(LogoVariant::Dark, "fetch failed"),
    ] {
        let err = export_with_compositor(
            &compositor,
            &images,
            &logo,
            &ExportOptions::default(),
            &progress,
        )
        .unwrap_err();
        assert!(matches!(err, LogomarkError::NotReady(_)));
    }
    assert_eq!(compositor.invocations(), 0);
}

#[test]
fn export_with_only_failed_decodes_is_not_ready() {
    let images = vec![
        SourceImage {
            name: "bad.png".to_string(),
            state: logomark::DecodeState::Failed("truncated".to_string()),
        },
        SourceImage::pending("late.png"),
    ];
    let progress = ExportProgress::new();

    let err = logomark::export(&images, &ready_logo(), &ExportOptions::default(), &progress)
        .unwrap_err();
    assert!(matches!(err, LogomarkError::NotReady(_)));
}

#[test]
fn mid_batch_failure_aborts_export_and_settles_state() {
    // 100 good images, one marked bad inside the second chunk.
    let mut images = ready_images(100);
    images[94] = SourceImage::ready("bad.png", tiny_bitmap(2));

    let progress = ExportProgress::new();
    let opts = ExportOptions {
        chunk_size: 90,
        threads: Some(2),
    };

    let err = export_with_compositor(&FailingCompositor, &images, &ready_logo(), &opts, &progress)
        .unwrap_err();

    assert!(matches!(err, LogomarkError::Composite(_)));
    // The first chunk settled, the failing one never advanced the counter.
    assert_eq!(progress.completed(), 90);
    assert!(progress.completed() < progress.total());
    assert!(!progress.is_loading());
    assert_eq!(progress.status(), ExportStatus::Failed);
}

#[test]
fn failed_decodes_are_skipped_but_ready_images_still_export() {
    let mut images = ready_images(3);
    images.insert(
        1,
        SourceImage {
            name: "bad.png".to_string(),
            state: logomark::DecodeState::Failed("truncated".to_string()),
        },
    );

    let progress = ExportProgress::new();
    let compositor = RecordingCompositor::new(progress.clone());
    let archive = export_with_compositor(
        &compositor,
        &images,
        &ready_logo(),
        &ExportOptions::default(),
        &progress,
    )
    .unwrap();

    assert_eq!(progress.total(), 3);
    assert_eq!(progress.completed(), 3);

    let zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
    assert_eq!(zip.len(), 3);
}

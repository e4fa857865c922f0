use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering},
};

use rayon::prelude::*;

use crate::{
    archive::ArchiveBuilder,
    bitmap::{Bitmap, SourceImage},
    composite::{Compositor, LogoCompositor},
    error::{LogomarkError, LogomarkResult},
    logo::LogoAsset,
};

/// Export tuning knobs.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Images composited concurrently per join point. Caps peak concurrency
    /// (and therefore held pixel buffers) regardless of batch size.
    pub chunk_size: usize,
    /// Worker thread cap; `None` lets rayon pick.
    pub threads: Option<usize>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            chunk_size: 90,
            threads: None,
        }
    }
}

/// Lifecycle of one export run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

const STATUS_IDLE: u8 = 0;
const STATUS_RUNNING: u8 = 1;
const STATUS_SUCCEEDED: u8 = 2;
const STATUS_FAILED: u8 = 3;

/// Shared, pollable view of a running export.
///
/// `completed` advances once per settled chunk, never per image, so observers
/// only ever see chunk-boundary values. `loading` spans the whole export and
/// clears on every exit path.
#[derive(Clone, Debug, Default)]
pub struct ExportProgress(Arc<ProgressInner>);

#[derive(Debug, Default)]
struct ProgressInner {
    completed: AtomicUsize,
    total: AtomicUsize,
    loading: AtomicBool,
    status: AtomicU8,
}

impl ExportProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images completed so far. Monotonically increasing within a run.
    pub fn completed(&self) -> usize {
        self.0.completed.load(Ordering::Acquire)
    }

    /// Images in the running (or last) export snapshot.
    pub fn total(&self) -> usize {
        self.0.total.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        self.0.loading.load(Ordering::Acquire)
    }

    pub fn status(&self) -> ExportStatus {
        match self.0.status.load(Ordering::Acquire) {
            STATUS_RUNNING => ExportStatus::Running,
            STATUS_SUCCEEDED => ExportStatus::Succeeded,
            STATUS_FAILED => ExportStatus::Failed,
            _ => ExportStatus::Idle,
        }
    }

    fn begin(&self, total: usize) {
        self.0.completed.store(0, Ordering::Release);
        self.0.total.store(total, Ordering::Release);
        self.0.status.store(STATUS_RUNNING, Ordering::Release);
        self.0.loading.store(true, Ordering::Release);
    }

    fn advance(&self, n: usize) {
        self.0.completed.fetch_add(n, Ordering::AcqRel);
    }

    fn mark_succeeded(&self) {
        self.0.status.store(STATUS_SUCCEEDED, Ordering::Release);
    }

    fn mark_failed_if_running(&self) {
        let _ = self.0.status.compare_exchange(
            STATUS_RUNNING,
            STATUS_FAILED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn clear_loading(&self) {
        self.0.loading.store(false, Ordering::Release);
    }
}

/// Clears `loading` and settles the status on every exit path, early returns
/// included.
struct RunGuard<'a>(&'a ExportProgress);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_failed_if_running();
        self.0.clear_loading();
    }
}

/// Composite the logo onto every ready image and bundle the results into one
/// ZIP, returned as bytes.
pub fn export(
    images: &[SourceImage],
    logo: &LogoAsset,
    opts: &ExportOptions,
    progress: &ExportProgress,
) -> LogomarkResult<Vec<u8>> {
    export_with_compositor(&LogoCompositor, images, logo, opts, progress)
}

/// [`export`] with an explicit compositor implementation.
///
/// Entries are named `image_<n>.jpg` with `n` the 1-based index of the image
/// in the ready snapshot, so archive content is deterministic no matter how
/// composite completions interleave inside a chunk. Chunk N+1 never starts
/// before chunk N has fully settled; the first composite failure aborts the
/// whole export and no archive is emitted.
#[tracing::instrument(skip_all, fields(images = images.len(), chunk_size = opts.chunk_size))]
pub fn export_with_compositor(
    compositor: &dyn Compositor,
    images: &[SourceImage],
    logo: &LogoAsset,
    opts: &ExportOptions,
    progress: &ExportProgress,
) -> LogomarkResult<Vec<u8>> {
    if images.is_empty() {
        return Err(LogomarkError::not_ready("no images to export"));
    }
    let logo_bitmap = logo.bitmap().ok_or_else(|| {
        LogomarkError::not_ready(format!("logo variant '{}' is not loaded", logo.variant))
    })?;

    // Snapshot the ready bitmaps up front: a caller replacing its selection
    // mid-run cannot mutate this job's inputs.
    let ready: Vec<&Bitmap> = images.iter().filter_map(SourceImage::bitmap).collect();
    if ready.is_empty() {
        return Err(LogomarkError::not_ready("no decoded images to export"));
    }

    progress.begin(ready.len());
    let _guard = RunGuard(progress);

    let pool = build_thread_pool(opts.threads)?;
    let chunk_size = normalized_chunk_size(opts.chunk_size);
    let mut builder = ArchiveBuilder::new();

    for (start, end) in chunk_ranges(ready.len(), chunk_size) {
        let chunk = &ready[start..end];
        let results: Vec<LogomarkResult<Vec<u8>>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|bitmap| compositor.composite(bitmap, logo_bitmap))
                .collect()
        });

        for (offset, result) in results.into_iter().enumerate() {
            let bytes = result?;
            builder.add_entry(&format!("image_{}.jpg", start + offset + 1), &bytes)?;
        }

        progress.advance(end - start);
        tracing::debug!(start, end, completed = progress.completed(), "chunk settled");
    }

    let archive = builder.finalize()?;
    progress.mark_succeeded();
    Ok(archive)
}

fn build_thread_pool(threads: Option<usize>) -> LogomarkResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(LogomarkError::Other(anyhow::anyhow!(
            "export 'threads' must be >= 1 when set"
        )));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| LogomarkError::Other(anyhow::anyhow!("build export thread pool: {e}")))
}

fn normalized_chunk_size(chunk_size: usize) -> usize {
    chunk_size.max(1)
}

/// Half-open `(start, end)` chunk bounds covering `0..total`.
pub(crate) fn chunk_ranges(total: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(total.div_ceil(chunk_size.max(1)));
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total);
        out.push((start, end));
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ranges_cover_exact_multiples_and_remainders() {
        assert_eq!(
            chunk_ranges(250, 90),
            vec![(0, 90), (90, 180), (180, 250)]
        );
        assert_eq!(chunk_ranges(180, 90), vec![(0, 90), (90, 180)]);
        assert_eq!(chunk_ranges(1, 90), vec![(0, 1)]);
        assert!(chunk_ranges(0, 90).is_empty());
    }

    #[test]
    fn progress_starts_idle() {
        let p = ExportProgress::new();
        assert_eq!(p.status(), ExportStatus::Idle);
        assert_eq!(p.completed(), 0);
        assert_eq!(p.total(), 0);
        assert!(!p.is_loading());
    }

    #[test]
    fn run_guard_fails_a_running_export_and_clears_loading() {
        let p = ExportProgress::new();
        p.begin(10);
        assert!(p.is_loading());
        assert_eq!(p.status(), ExportStatus::Running);

        drop(RunGuard(&p));
        assert!(!p.is_loading());
        assert_eq!(p.status(), ExportStatus::Failed);
    }

    #[test]
    fn run_guard_keeps_a_settled_status() {
        let p = ExportProgress::new();
        p.begin(10);
        p.mark_succeeded();
        drop(RunGuard(&p));
        assert!(!p.is_loading());
        assert_eq!(p.status(), ExportStatus::Succeeded);
    }

    #[test]
    fn zero_chunk_size_normalizes_to_one() {
        assert_eq!(normalized_chunk_size(0), 1);
        assert_eq!(chunk_ranges(3, 1), vec![(0, 1), (1, 2), (2, 3)]);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let err = build_thread_pool(Some(0)).unwrap_err();
        assert!(matches!(err, LogomarkError::Other(_)));
        assert!(err.to_string().contains("threads"));
    }
}

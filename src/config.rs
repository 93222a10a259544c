use std::sync::atomic::{AtomicUsize, Ordering};

// Bulk queries over fewer query points than this stay on the calling thread.
const DEFAULT_PARALLEL_THRESHOLD: usize = 256;

static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

pub fn get_parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

pub fn set_parallel_threshold(val: usize) {
    PARALLEL_THRESHOLD.store(val, Ordering::Relaxed);
}

pub fn get_num_threads() -> usize {
    rayon::current_num_threads()
}

/// Sizes the global rayon pool. Only the first call before any parallel
/// work takes effect; later calls are ignored.
pub fn set_num_threads(n: usize) {
    let _ = rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global();
}

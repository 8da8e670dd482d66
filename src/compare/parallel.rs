const PARALLEL_CHUNK_ALIGNMENT_PIXELS: usize = 256;

/// Workers available to a comparison running on the current rayon pool.
/// Inside the orchestrator's worker pool this is that pool's size.
#[inline]
pub(crate) fn compare_workers(max_workers: usize) -> usize {
    rayon::current_num_threads().min(max_workers.max(1))
}

#[inline(always)]
pub(crate) fn should_parallelize(
    pixel_count: usize,
    min_pixels: usize,
    min_chunk_pixels: usize,
    max_workers: usize,
) -> bool {
    let workers = compare_workers(max_workers);
    if workers <= 1 {
        return false;
    }
    let min_chunk_total = min_chunk_pixels.saturating_mul(workers);
    pixel_count >= min_pixels.max(min_chunk_total)
}

#[inline(always)]
pub(crate) fn parallel_chunk_pixels(
    pixel_count: usize,
    min_chunk_pixels: usize,
    max_workers: usize,
) -> Option<usize> {
    let alignment = PARALLEL_CHUNK_ALIGNMENT_PIXELS.max(1);
    let workers = compare_workers(max_workers);
    let mut chunk_pixels = pixel_count / workers;

    if chunk_pixels < min_chunk_pixels {
        return None;
    }

    chunk_pixels -= chunk_pixels % alignment;
    if chunk_pixels == 0 || pixel_count.div_ceil(chunk_pixels) < 2 {
        return None;
    }

    Some(chunk_pixels)
}

//! Memory prefetch hints for the bounded resolver.
//!
//! Purely a latency optimisation: on targets without a prefetch instruction,
//! or with the `prefetch` feature disabled, the hint compiles to nothing.

/// Hint that the element at `index` will be read soon.
///
/// Out-of-range indices are ignored, so callers can pass speculative
/// positions without bounds checks of their own.
#[inline(always)]
pub fn prefetch_read<T>(data: &[T], index: usize) {
    #[cfg(all(feature = "prefetch", target_arch = "x86_64"))]
    {
        if index < data.len() {
            // SAFETY: the pointer is in bounds and prefetch never faults.
            unsafe {
                use std::arch::x86_64::{_mm_prefetch, _MM_HINT_NTA};
                let ptr = data.as_ptr().add(index) as *const i8;
                _mm_prefetch(ptr, _MM_HINT_NTA);
            }
        }
    }
    #[cfg(not(all(feature = "prefetch", target_arch = "x86_64")))]
    let _ = (data, index);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefetch_out_of_range_is_noop() {
        let data = [1u64, 2, 3];
        prefetch_read(&data, 0);
        prefetch_read(&data, 3);
        prefetch_read(&data, usize::MAX);
        let empty: [u64; 0] = [];
        prefetch_read(&empty, 0);
    }
}

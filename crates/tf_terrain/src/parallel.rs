// crates/tf_terrain/src/parallel.rs

//! 逐行并行辅助
//!
//! 小栅格串行执行，超过阈值后按行交给 rayon。

use rayon::prelude::*;

/// 默认并行阈值（单元数）
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 16_384;

/// 对输出缓冲区逐行调用 `f(row, line)`
pub(crate) fn for_each_row<T, F>(out: &mut [T], cols: usize, threshold: usize, f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    if out.len() >= threshold {
        out.par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row, line)| f(row, line));
    } else {
        out.chunks_mut(cols)
            .enumerate()
            .for_each(|(row, line)| f(row, line));
    }
}

//! Placement of decoded chunks into the destination cube

use crate::geometry::{ChunkDomain, CubeTarget, ReadRegion};

/// Row-major strides for `shape`
fn strides(shape: &[u64]) -> Vec<u64> {
    let mut strides = vec![1u64; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Copy the part of a decoded chunk that lies inside `region` into `dst`
///
/// `src` holds the chunk in its own (clipped) row-major shape, `dst` is laid
/// out with `cube.dims`. Each contiguous run along the last axis goes through
/// `convert` in one call. Returns the number of elements written.
///
/// Callers guarantee `src` holds `domain.element_count()` elements, `dst`
/// holds `cube.element_count()` elements, and `cube` fits `region`.
pub fn copy_chunk<S, T, F>(
    domain: &ChunkDomain,
    src: &[S],
    region: &ReadRegion,
    cube: &CubeTarget,
    dst: &mut [T],
    mut convert: F,
) -> u64
where
    F: FnMut(&[S], &mut [T]),
{
    let ndim = domain.offset.len();
    let mut local_start = Vec::with_capacity(ndim);
    let mut cube_start = Vec::with_capacity(ndim);
    let mut len = Vec::with_capacity(ndim);
    for i in 0..ndim {
        let lo = domain.offset[i].max(region.offset[i]);
        let hi = (domain.offset[i] + domain.extent[i]).min(region.offset[i] + region.count[i]);
        if lo >= hi {
            return 0;
        }
        local_start.push(lo - domain.offset[i]);
        cube_start.push(lo - region.offset[i] + cube.offset[i]);
        len.push(hi - lo);
    }

    let src_strides = strides(&domain.extent);
    let dst_strides = strides(&cube.dims);
    let run = len[ndim - 1] as usize;
    let mut index = vec![0u64; ndim];
    let mut written = 0u64;

    loop {
        let mut src_pos = 0u64;
        let mut dst_pos = 0u64;
        for i in 0..ndim {
            src_pos += (local_start[i] + index[i]) * src_strides[i];
            dst_pos += (cube_start[i] + index[i]) * dst_strides[i];
        }
        let (src_pos, dst_pos) = (src_pos as usize, dst_pos as usize);
        convert(&src[src_pos..src_pos + run], &mut dst[dst_pos..dst_pos + run]);
        written += run as u64;

        // Odometer over every axis but the last
        let mut axis = ndim - 1;
        loop {
            if axis == 0 {
                return written;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < len[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}

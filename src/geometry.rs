//! Array geometry - how an om array is divided into chunks, and where a read lands

use crate::error::{OmError, Result};

/// Global array extents and the chunk shape that tiles them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayGeometry {
    dims: Vec<u64>,
    chunks: Vec<u64>,
    grid: Vec<u64>,
}

/// Sub-hyperrectangle of the array covered by one chunk, clipped to the array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDomain {
    pub offset: Vec<u64>,
    pub extent: Vec<u64>,
}

impl ChunkDomain {
    /// Number of elements stored for this chunk
    pub fn element_count(&self) -> u64 {
        self.extent.iter().product()
    }
}

impl ArrayGeometry {
    /// Create a geometry from array dimensions and chunk shape
    pub fn new(dims: Vec<u64>, chunks: Vec<u64>) -> Result<Self> {
        if dims.is_empty() {
            return Err(OmError::InvalidDimensions(
                "Array must have at least one dimension".to_string(),
            ));
        }
        if dims.len() != chunks.len() {
            return Err(OmError::InvalidDimensions(format!(
                "Array has {} dimensions but chunk shape has {}",
                dims.len(),
                chunks.len()
            )));
        }
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(OmError::InvalidDimensions(format!(
                "Dimension {} has zero extent",
                axis
            )));
        }
        if let Some(axis) = chunks.iter().position(|&c| c == 0) {
            return Err(OmError::InvalidDimensions(format!(
                "Chunk shape {} has zero extent",
                axis
            )));
        }

        let grid = dims
            .iter()
            .zip(chunks.iter())
            .map(|(&d, &c)| d.div_ceil(c))
            .collect();

        Ok(Self { dims, chunks, grid })
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunks
    }

    /// Number of chunks along each dimension
    pub fn grid_shape(&self) -> &[u64] {
        &self.grid
    }

    /// Total number of chunks
    pub fn chunk_count(&self) -> u64 {
        self.grid.iter().product()
    }

    /// Elements in a full (unclipped) chunk
    pub fn max_chunk_elements(&self) -> u64 {
        self.chunks.iter().product()
    }

    /// Convert a linear chunk index to chunk coordinates (row-major)
    pub fn linear_to_coord(&self, index: u64) -> Vec<u64> {
        let mut coord = vec![0; self.ndim()];
        let mut remaining = index;
        for (c, &n) in coord.iter_mut().zip(self.grid.iter()).rev() {
            *c = remaining % n;
            remaining /= n;
        }
        coord
    }

    /// Convert chunk coordinates to a linear chunk index (row-major)
    pub fn coord_to_linear(&self, coord: &[u64]) -> u64 {
        coord
            .iter()
            .zip(self.grid.iter())
            .fold(0, |index, (&c, &n)| index * n + c)
    }

    /// Get the array region covered by a chunk coordinate
    pub fn chunk_domain(&self, coord: &[u64]) -> ChunkDomain {
        let mut offset = Vec::with_capacity(self.ndim());
        let mut extent = Vec::with_capacity(self.ndim());
        for (i, &c) in coord.iter().enumerate() {
            let start = c * self.chunks[i];
            let end = (start + self.chunks[i]).min(self.dims[i]);
            offset.push(start);
            extent.push(end - start);
        }
        ChunkDomain { offset, extent }
    }

    /// Check that a region lies inside the array
    pub fn contains(&self, region: &ReadRegion) -> bool {
        region.ndim() == self.ndim()
            && region
                .offset
                .iter()
                .zip(region.count.iter())
                .zip(self.dims.iter())
                .all(|((&o, &c), &d)| o.checked_add(c).is_some_and(|end| end <= d))
    }
}

/// Requested hyperrectangle in array coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRegion {
    pub offset: Vec<u64>,
    pub count: Vec<u64>,
}

impl ReadRegion {
    pub fn new(offset: Vec<u64>, count: Vec<u64>) -> Self {
        Self { offset, count }
    }

    /// Region covering a whole array
    pub fn full(dims: &[u64]) -> Self {
        Self {
            offset: vec![0; dims.len()],
            count: dims.to_vec(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.offset.len()
    }

    /// True when any axis selects nothing
    pub fn is_empty(&self) -> bool {
        self.count.iter().any(|&c| c == 0)
    }

    /// Number of selected elements
    pub fn element_count(&self) -> u64 {
        self.count.iter().product()
    }

    /// Check whether a chunk domain overlaps this region
    pub fn intersects(&self, domain: &ChunkDomain) -> bool {
        (0..self.ndim()).all(|i| {
            let lo = domain.offset[i].max(self.offset[i]);
            let hi = (domain.offset[i] + domain.extent[i]).min(self.offset[i] + self.count[i]);
            lo < hi
        })
    }
}

/// Placement of a read inside the caller's destination buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeTarget {
    pub offset: Vec<u64>,
    pub dims: Vec<u64>,
}

impl CubeTarget {
    pub fn new(offset: Vec<u64>, dims: Vec<u64>) -> Self {
        Self { offset, dims }
    }

    /// Elements the destination buffer must hold
    pub fn element_count(&self) -> u64 {
        self.dims.iter().product()
    }

    /// Check that `region` fits at this placement
    pub fn fits(&self, region: &ReadRegion) -> bool {
        self.offset.len() == region.ndim()
            && self.dims.len() == region.ndim()
            && self
                .offset
                .iter()
                .zip(region.count.iter())
                .zip(self.dims.iter())
                .all(|((&o, &c), &d)| o.checked_add(c).is_some_and(|end| end <= d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_geometry() -> ArrayGeometry {
        ArrayGeometry::new(vec![1000, 800, 500], vec![64, 64, 64]).unwrap()
    }

    #[test]
    fn test_grid_shape() {
        let geometry = create_test_geometry();
        assert_eq!(geometry.grid_shape(), &[16, 13, 8]);
        assert_eq!(geometry.chunk_count(), 16 * 13 * 8);
        assert_eq!(geometry.max_chunk_elements(), 64 * 64 * 64);
    }

    #[test]
    fn test_index_conversion() {
        let geometry = create_test_geometry();
        let coord = vec![5, 7, 3];
        let index = geometry.coord_to_linear(&coord);
        assert_eq!(index, 5 * 13 * 8 + 7 * 8 + 3);
        assert_eq!(geometry.linear_to_coord(index), coord);

        for index in 0..geometry.chunk_count() {
            let coord = geometry.linear_to_coord(index);
            assert_eq!(geometry.coord_to_linear(&coord), index);
        }
    }

    #[test]
    fn test_chunk_domain() {
        let geometry = create_test_geometry();
        let domain = geometry.chunk_domain(&[0, 0, 0]);
        assert_eq!(domain.offset, vec![0, 0, 0]);
        assert_eq!(domain.extent, vec![64, 64, 64]);

        // Last chunk is clipped
        let domain = geometry.chunk_domain(&[15, 12, 7]);
        assert_eq!(domain.offset, vec![960, 768, 448]);
        assert_eq!(domain.extent, vec![40, 32, 52]);
        assert_eq!(domain.element_count(), 40 * 32 * 52);
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(ArrayGeometry::new(vec![], vec![]).is_err());
        assert!(ArrayGeometry::new(vec![10, 10], vec![5]).is_err());
        assert!(ArrayGeometry::new(vec![10, 0], vec![5, 5]).is_err());
        assert!(ArrayGeometry::new(vec![10, 10], vec![5, 0]).is_err());
    }

    #[test]
    fn test_region_bounds() {
        let geometry = ArrayGeometry::new(vec![10, 7], vec![3, 4]).unwrap();
        assert!(geometry.contains(&ReadRegion::full(&[10, 7])));
        assert!(geometry.contains(&ReadRegion::new(vec![9, 6], vec![1, 1])));
        assert!(!geometry.contains(&ReadRegion::new(vec![9, 6], vec![2, 1])));
        assert!(!geometry.contains(&ReadRegion::new(vec![0], vec![1])));
        assert!(!geometry.contains(&ReadRegion::new(vec![u64::MAX, 0], vec![2, 1])));
    }

    #[test]
    fn test_region_intersects() {
        let geometry = ArrayGeometry::new(vec![10, 7], vec![3, 4]).unwrap();
        let region = ReadRegion::new(vec![2, 3], vec![2, 2]);
        assert!(region.intersects(&geometry.chunk_domain(&[0, 0])));
        assert!(region.intersects(&geometry.chunk_domain(&[1, 1])));
        assert!(!region.intersects(&geometry.chunk_domain(&[2, 0])));
    }

    #[test]
    fn test_cube_fits() {
        let region = ReadRegion::new(vec![1, 1], vec![2, 2]);
        assert!(CubeTarget::new(vec![0, 0], vec![2, 2]).fits(&region));
        assert!(CubeTarget::new(vec![1, 0], vec![3, 2]).fits(&region));
        assert!(!CubeTarget::new(vec![1, 0], vec![2, 2]).fits(&region));
        assert!(!CubeTarget::new(vec![0], vec![2]).fits(&region));
    }
}

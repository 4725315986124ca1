//! Block wise execution of per plane raster operations.
//!
//! Every spatial operation is expressed as a pure function from one 2-D (y, x) plane to an output plane.
//! The planes of an array are grouped in blocks according to the chunk layout of the non spatial dimensions.
//! Blocks are processed independently, sequentially or in parallel on a rayon thread pool, and the results
//! are reassembled in the original dimension order. The output does not depend on the chunking.

use std::collections::BTreeMap;

use ndarray::{Array2, Array3, ArrayD, ArrayView2, ArrayView3, Axis, IxDyn};

use crate::{ArrayNum, Error, LabeledArray, RasterArray, RasterConfig, RasterSize, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumThreads {
    AllCpus,
    Count(usize),
}

/// Chunk sizes of the non spatial dimensions, dimensions without an entry form a single chunk
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkLayout {
    sizes: BTreeMap<String, usize>,
}

impl ChunkLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk(mut self, dim: impl Into<String>, size: usize) -> Self {
        self.sizes.insert(dim.into(), size);
        self
    }

    pub fn chunk_size(&self, dim: &str) -> Option<usize> {
        self.sizes.get(dim).copied()
    }

    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.sizes.keys().map(String::as_str)
    }

    /// The spatial dimensions are never split, other chunked dimensions must exist
    pub(crate) fn validate<A: LabeledArray + ?Sized>(&self, arr: &A, cfg: &RasterConfig) -> Result<()> {
        for (dim, &size) in &self.sizes {
            if dim == &cfg.x_dim || dim == &cfg.y_dim {
                return Err(Error::InvalidArgument(format!("Spatial dimension '{dim}' cannot be chunked")));
            }

            if size == 0 {
                return Err(Error::InvalidArgument(format!("Invalid chunk size 0 for dimension '{dim}'")));
            }

            arr.dim_index(dim)?;
        }

        Ok(())
    }
}

/// A group of planes that is processed as a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBlock {
    /// Chunk coordinates along the non spatial dimensions
    pub index: Vec<usize>,
    /// Indices of the planes that belong to this chunk
    pub planes: Vec<usize>,
}

/// The 2-D spatial planes of an n-dimensional array, stacked along a single leading axis
pub struct SpatialPlanes<T> {
    planes: Array3<T>,
    outer_dims: Vec<String>,
    outer_shape: Vec<usize>,
    permutation: Vec<usize>,
}

impl<T: Clone> SpatialPlanes<T> {
    pub fn split(data: &ArrayD<T>, dims: &[String], y_axis: usize, x_axis: usize) -> Result<Self> {
        let mut permutation: Vec<usize> = (0..data.ndim()).filter(|&axis| axis != y_axis && axis != x_axis).collect();
        let outer_dims = permutation.iter().map(|&axis| dims[axis].clone()).collect();
        let outer_shape: Vec<usize> = permutation.iter().map(|&axis| data.shape()[axis]).collect();
        permutation.extend([y_axis, x_axis]);

        let count = outer_shape.iter().product();
        let (rows, cols) = (data.shape()[y_axis], data.shape()[x_axis]);
        let planes = data
            .view()
            .permuted_axes(IxDyn(&permutation))
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((count, rows, cols))?;

        Ok(SpatialPlanes {
            planes,
            outer_dims,
            outer_shape,
            permutation,
        })
    }

    pub fn len(&self) -> usize {
        self.planes.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn plane(&self, index: usize) -> ArrayView2<'_, T> {
        self.planes.index_axis(Axis(0), index)
    }

    pub fn view(&self) -> ArrayView3<'_, T> {
        self.planes.view()
    }

    /// Group the planes per chunk, without a layout all planes form a single block
    pub fn blocks(&self, chunks: Option<&ChunkLayout>) -> Vec<ChunkBlock> {
        if self.is_empty() {
            return Vec::new();
        }

        let Some(chunks) = chunks else {
            return vec![ChunkBlock {
                index: Vec::new(),
                planes: (0..self.len()).collect(),
            }];
        };

        let mut grouped: BTreeMap<Vec<usize>, Vec<usize>> = BTreeMap::new();
        for plane in 0..self.len() {
            let mut remainder = plane;
            let mut index = vec![0; self.outer_shape.len()];
            for dim in (0..self.outer_shape.len()).rev() {
                let len = self.outer_shape[dim];
                let position = remainder % len;
                remainder /= len;
                let chunk_size = chunks.chunk_size(&self.outer_dims[dim]).unwrap_or(len).max(1);
                index[dim] = position / chunk_size;
            }

            grouped.entry(index).or_default().push(plane);
        }

        grouped.into_iter().map(|(index, planes)| ChunkBlock { index, planes }).collect()
    }

    /// Restore the original dimension order for processed planes, the plane size may differ from the input
    pub fn join<U: Clone>(&self, planes: Array3<U>) -> Result<ArrayD<U>> {
        let (count, rows, cols) = planes.dim();
        if count != self.len() {
            return Err(Error::Runtime(format!("Expected {} planes, got {count}", self.len())));
        }

        let mut shape = self.outer_shape.clone();
        shape.extend([rows, cols]);

        let mut inverse = vec![0; self.permutation.len()];
        for (position, &axis) in self.permutation.iter().enumerate() {
            inverse[axis] = position;
        }

        let reshaped = planes.as_standard_layout().into_owned().into_shape_with_order(IxDyn(&shape))?;
        Ok(reshaped.permuted_axes(IxDyn(&inverse)).as_standard_layout().into_owned())
    }
}

#[cfg(feature = "rayon")]
fn create_scoped_thread_pool(thread_count: Option<usize>) -> Result<rayon::ThreadPool> {
    let mut pool_builder = rayon::ThreadPoolBuilder::new();
    if let Some(count) = thread_count {
        pool_builder = pool_builder.num_threads(count);
    }
    pool_builder
        .build()
        .map_err(|e| Error::Runtime(format!("Failed to create threadpool: {e}")))
}

/// Apply `f` to every block, the buffer passed to `f` holds the planes of the block in order.
pub fn map_blocks<T, U, F>(planes: &SpatialPlanes<T>, blocks: &[ChunkBlock], num_threads: NumThreads, f: F) -> Result<Vec<Array3<U>>>
where
    T: Clone + Send + Sync,
    U: Send,
    F: Fn(&ChunkBlock, ArrayView3<T>) -> Result<Array3<U>> + Sync,
{
    let run = |block: &ChunkBlock| {
        let buffer = planes.planes.select(Axis(0), &block.planes);
        f(block, buffer.view())
    };

    let thread_count = match num_threads {
        NumThreads::AllCpus => None,
        NumThreads::Count(count) => Some(count),
    };

    if blocks.len() <= 1 || thread_count.is_some_and(|count| count <= 1) {
        return blocks.iter().map(run).collect();
    }

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;

        log::debug!("Processing {} chunks in parallel", blocks.len());
        let pool = create_scoped_thread_pool(thread_count)?;
        pool.install(|| blocks.par_iter().map(run).collect())
    }

    #[cfg(not(feature = "rayon"))]
    {
        log::debug!("Parallel processing requires the rayon feature, processing {} chunks sequentially", blocks.len());
        blocks.iter().map(run).collect()
    }
}

fn stack_planes<U: Clone>(planes: &[Array2<U>], size: RasterSize) -> Result<Array3<U>> {
    if planes.is_empty() {
        return Ok(Array3::from_shape_vec((0, size.rows, size.cols), Vec::new())?);
    }

    let views: Vec<ArrayView2<U>> = planes.iter().map(|p| p.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Apply a per plane function to all spatial planes of the array, honouring its chunk layout.
///
/// `out_size` is the size of the produced planes.
pub(crate) fn map_spatial_planes<T, U, F>(arr: &RasterArray<T>, cfg: &RasterConfig, out_size: RasterSize, f: F) -> Result<ArrayD<U>>
where
    T: ArrayNum,
    U: Clone + Send + Sync,
    F: Fn(ArrayView2<T>) -> Result<Array2<U>> + Sync,
{
    let (y_axis, x_axis) = arr.spatial_axes(cfg)?;
    let planes = SpatialPlanes::split(arr.data(), arr.dims(), y_axis, x_axis)?;
    let blocks = planes.blocks(arr.chunks());
    if arr.chunks().is_some() {
        log::debug!("Processing {} planes in {} chunks", planes.len(), blocks.len());
    }

    let results = map_blocks(&planes, &blocks, cfg.num_threads, |_, buffer| {
        let outputs = buffer.outer_iter().map(&f).collect::<Result<Vec<_>>>()?;
        for output in &outputs {
            if output.dim() != (out_size.rows, out_size.cols) {
                return Err(Error::SizeMismatch {
                    size1: output.dim(),
                    size2: (out_size.rows, out_size.cols),
                });
            }
        }
        stack_planes(&outputs, out_size)
    })?;

    let mut ordered: Vec<Option<Array2<U>>> = vec![None; planes.len()];
    for (block, result) in blocks.iter().zip(results) {
        for (position, &plane) in block.planes.iter().enumerate() {
            ordered[plane] = Some(result.index_axis(Axis(0), position).to_owned());
        }
    }

    let ordered = ordered
        .into_iter()
        .map(|plane| plane.ok_or_else(|| Error::Runtime("Missing output plane".into())))
        .collect::<Result<Vec<_>>>()?;

    planes.join(stack_planes(&ordered, out_size)?)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, ArrayD, IxDyn};

    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn split_and_join_restore_the_dimension_order() {
        // (y, band, x)
        let data = Array::from_iter(0..24).into_shape_with_order(IxDyn(&[3, 2, 4])).unwrap();
        let planes = SpatialPlanes::split(&data, &dims(&["y", "band", "x"]), 0, 2).unwrap();

        assert_eq!(planes.len(), 2);
        assert_eq!(planes.plane(1)[[0, 0]], 4);
        assert_eq!(planes.plane(1)[[2, 3]], 23);

        let joined: ArrayD<i32> = planes.join(planes.view().to_owned()).unwrap();
        assert_eq!(joined, data);
    }

    #[test]
    fn chunk_blocks_group_planes() {
        let data = ArrayD::<f32>::zeros(IxDyn(&[5, 2, 3, 3]));
        let planes = SpatialPlanes::split(&data, &dims(&["time", "band", "y", "x"]), 2, 3).unwrap();
        assert_eq!(planes.len(), 10);

        assert_eq!(planes.blocks(None).len(), 1);

        let layout = ChunkLayout::new().with_chunk("time", 2);
        let blocks = planes.blocks(Some(&layout));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].planes, vec![0, 1, 2, 3]);
        assert_eq!(blocks[2].planes, vec![8, 9]);

        let layout = ChunkLayout::new().with_chunk("time", 5).with_chunk("band", 1);
        let blocks = planes.blocks(Some(&layout));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].index, vec![0, 1]);
        assert_eq!(blocks[1].planes, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn map_blocks_preserves_plane_order() {
        let data = Array::from_iter(0..18).into_shape_with_order(IxDyn(&[2, 3, 3])).unwrap();
        let planes = SpatialPlanes::split(&data, &dims(&["band", "y", "x"]), 1, 2).unwrap();
        let blocks = planes.blocks(Some(&ChunkLayout::new().with_chunk("band", 1)));

        let results = map_blocks(&planes, &blocks, NumThreads::Count(2), |block, buffer| {
            assert_eq!(buffer.len_of(Axis(0)), block.planes.len());
            Ok(buffer.mapv(|v| v * 2))
        })
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[1][[0, 0, 0]], 18);
    }
}

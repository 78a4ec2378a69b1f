//! Exact nearest-neighbour search by squared Euclidean distance.
//!
//! Vectors are kept in one contiguous row-major buffer and every query is
//! compared against every row. Results are ordered by ascending distance, ties
//! by ascending position, so the same query always yields the same list.

use crate::error::{Result, RetrieverError};
use std::cmp::Ordering;

/// One search hit: a row of the index and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Brute-force L2 index over fixed-width `f32` vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Build an index from rows that must all have width `dimension`.
    pub fn from_vectors<I>(dimension: usize, vectors: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<[f32]>,
    {
        let mut index = Self::new(dimension);
        for vector in vectors {
            index.add(vector.as_ref())?;
        }
        Ok(index)
    }

    /// Append a row; its position is the previous [`len`](Self::len).
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    /// Rows in position order
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        // chunks_exact panics on a zero width; a zero-width index has no rows
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// The `k` rows closest to `query`, nearest first.
    ///
    /// An empty index returns no hits without looking at the query. Otherwise a
    /// query of the wrong width is a [`RetrieverError::DimensionMismatch`].
    /// `k` larger than the index returns every row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RetrieverError::invalid_argument("k must be at least 1"));
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RetrieverError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<Neighbor> = self
            .vectors()
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance_then_position);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_distance_then_position);
        Ok(hits)
    }
}

fn by_distance_then_position(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}

/// Squared Euclidean distance. Callers check that the widths agree.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

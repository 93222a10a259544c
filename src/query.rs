use crate::ball::BallQuery;
use crate::domain::Domain;
use crate::error::QueryError;
use crate::nearest::NearestQuery;
use std::cmp::Ordering;
use std::iter::FusedIterator;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryMode {
    /// No mode selected; querying with it is an error.
    #[default]
    None,
    /// Every point in the distance window `[r_min, r_max)`.
    Ball,
    /// The `num_neighbors` closest points inside `[r_min, r_max)`.
    Nearest,
}

/// Arguments of a single neighbor query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryArgs {
    pub mode: QueryMode,
    pub r_max: f64,
    pub r_min: f64,
    pub num_neighbors: Option<usize>,
    /// Skip the bond whose reference index equals the query index.
    pub exclude_self: bool,
}

impl QueryArgs {
    pub fn ball(r_max: f64) -> Self {
        Self {
            mode: QueryMode::Ball,
            r_max,
            ..Default::default()
        }
    }

    pub fn nearest(num_neighbors: usize, r_max: f64) -> Self {
        Self {
            mode: QueryMode::Nearest,
            r_max,
            num_neighbors: Some(num_neighbors),
            ..Default::default()
        }
    }

    pub fn with_r_min(mut self, r_min: f64) -> Self {
        self.r_min = r_min;
        self
    }

    pub fn with_exclude_self(mut self, exclude_self: bool) -> Self {
        self.exclude_self = exclude_self;
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.mode == QueryMode::None {
            return Err(QueryError::UnsupportedMode);
        }
        if !self.r_max.is_finite() || self.r_max <= 0.0 {
            return Err(QueryError::InvalidRMax(self.r_max));
        }
        if !self.r_min.is_finite() || self.r_min < 0.0 {
            return Err(QueryError::InvalidRMin(self.r_min));
        }
        if self.r_min >= self.r_max {
            return Err(QueryError::InvalidRange {
                r_min: self.r_min,
                r_max: self.r_max,
            });
        }
        if self.mode == QueryMode::Nearest && !self.num_neighbors.is_some_and(|k| k > 0) {
            return Err(QueryError::MissingNumNeighbors);
        }
        Ok(())
    }
}

/// One (query point, reference point) pair found by a query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighborBond {
    pub query_point_index: usize,
    pub point_index: usize,
    pub distance: f64,
}

impl NeighborBond {
    pub fn new(query_point_index: usize, point_index: usize, distance: f64) -> Self {
        Self {
            query_point_index,
            point_index,
            distance,
        }
    }

    /// Ascending distance, ties broken by reference index.
    pub fn cmp_by_distance(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.point_index.cmp(&other.point_index))
    }
}

/// Lazy stream of bonds for one query point, borrowed from a cell list.
///
/// Single use: once it returns `None` it keeps returning `None`.
pub enum NeighborQueryIter<'a, D: Domain> {
    Ball(BallQuery<'a, D>),
    Nearest(NearestQuery<'a, D>),
}

impl<D: Domain> Iterator for NeighborQueryIter<'_, D> {
    type Item = NeighborBond;

    fn next(&mut self) -> Option<NeighborBond> {
        match self {
            Self::Ball(it) => it.next(),
            Self::Nearest(it) => it.next(),
        }
    }
}

impl<D: Domain> FusedIterator for NeighborQueryIter<'_, D> {}

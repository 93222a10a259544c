use crate::cell_list::CellList;
use crate::config;
use crate::domain::Domain;
use crate::error::{HistogramError, QueryError};
use crate::query::QueryArgs;
use nalgebra::Vector3;
use rayon::prelude::*;
use std::f64::consts::PI;
use tracing::info_span;

/// Radial distribution function g(r) accumulated over any number of frames.
///
/// Each frame streams ball-query bonds into per-worker histograms which are
/// summed at the end, so the cell list is only ever read.
#[derive(Clone, Debug)]
pub struct Rdf {
    r_min: f64,
    r_max: f64,
    bin_edges: Vec<f64>,
    bin_counts: Vec<u64>,
    frames: usize,
    n_points: usize,
    n_query_points: usize,
    volume: f64,
    is_2d: bool,
}

impl Rdf {
    pub fn new(bins: usize, r_max: f64, r_min: f64) -> Result<Self, HistogramError> {
        if bins == 0 {
            return Err(HistogramError::NoBins);
        }
        if !(r_min.is_finite() && r_max.is_finite()) || r_min < 0.0 || r_min >= r_max {
            return Err(HistogramError::InvalidRange { r_min, r_max });
        }
        let dr = (r_max - r_min) / bins as f64;
        let bin_edges = (0..=bins).map(|i| r_min + i as f64 * dr).collect();
        Ok(Self {
            r_min,
            r_max,
            bin_edges,
            bin_counts: vec![0; bins],
            frames: 0,
            n_points: 0,
            n_query_points: 0,
            volume: 0.0,
            is_2d: false,
        })
    }

    pub fn num_bins(&self) -> usize {
        self.bin_counts.len()
    }

    pub fn r_max(&self) -> f64 {
        self.r_max
    }

    pub fn r_min(&self) -> f64 {
        self.r_min
    }

    /// Number of frames accumulated since construction or the last reset.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn bin_edges(&self) -> &[f64] {
        &self.bin_edges
    }

    pub fn bin_centers(&self) -> Vec<f64> {
        self.bin_edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    pub fn bin_counts(&self) -> &[u64] {
        &self.bin_counts
    }

    pub fn reset(&mut self) {
        self.bin_counts.iter_mut().for_each(|c| *c = 0);
        self.frames = 0;
        self.n_points = 0;
        self.n_query_points = 0;
        self.volume = 0.0;
    }

    /// Adds one frame: every bond between `query_points` and the points of
    /// `cell_list` with a length in `[r_min, r_max)`.
    pub fn accumulate<D: Domain>(
        &mut self,
        cell_list: &CellList<D>,
        query_points: &[Vector3<f64>],
        exclude_self: bool,
    ) -> Result<(), QueryError> {
        let _span = info_span!(
            "Rdf::accumulate",
            n_points = cell_list.num_points(),
            n_query_points = query_points.len()
        )
        .entered();
        let args = QueryArgs::ball(self.r_max)
            .with_r_min(self.r_min)
            .with_exclude_self(exclude_self);
        args.validate()?;

        let bins = self.num_bins();
        let dr = (self.r_max - self.r_min) / bins as f64;
        let r_min = self.r_min;
        let fill = |mut hist: Vec<u64>, i: usize| -> Result<Vec<u64>, QueryError> {
            for bond in cell_list.query(query_points[i], i, &args)? {
                let bin = (((bond.distance - r_min) / dr) as usize).min(bins - 1);
                hist[bin] += 1;
            }
            Ok(hist)
        };

        let frame_counts = if query_points.len() >= config::get_parallel_threshold() {
            (0..query_points.len())
                .into_par_iter()
                .try_fold(|| vec![0u64; bins], fill)
                .try_reduce(
                    || vec![0u64; bins],
                    |mut a, b| {
                        a.iter_mut().zip(&b).for_each(|(x, y)| *x += y);
                        Ok(a)
                    },
                )?
        } else {
            (0..query_points.len()).try_fold(vec![0u64; bins], fill)?
        };

        self.bin_counts
            .iter_mut()
            .zip(&frame_counts)
            .for_each(|(x, y)| *x += y);
        self.frames += 1;
        self.n_points = cell_list.num_points();
        self.n_query_points = query_points.len();
        self.volume = cell_list.domain().volume();
        self.is_2d = cell_list.grid().is_2d();
        Ok(())
    }

    /// Bin volumes: spherical shells in 3D, annuli in 2D.
    fn shell_volumes(&self) -> Vec<f64> {
        self.bin_edges
            .windows(2)
            .map(|w| {
                if self.is_2d {
                    PI * (w[1] * w[1] - w[0] * w[0])
                } else {
                    4.0 / 3.0 * PI * (w[1].powi(3) - w[0].powi(3))
                }
            })
            .collect()
    }

    /// g(r), normalized by frame count, query count, number density and bin
    /// volume. All zeros before the first frame.
    pub fn rdf(&self) -> Vec<f64> {
        if self.frames == 0 || self.n_query_points == 0 {
            return vec![0.0; self.num_bins()];
        }
        let density = self.n_points as f64 / self.volume;
        let norm = (self.frames * self.n_query_points) as f64;
        self.bin_counts
            .iter()
            .zip(self.shell_volumes())
            .map(|(&c, v)| c as f64 / norm / (density * v))
            .collect()
    }

    /// Average number of points within the upper edge of each bin of a
    /// query point.
    pub fn n_r(&self) -> Vec<f64> {
        if self.frames == 0 || self.n_query_points == 0 {
            return vec![0.0; self.num_bins()];
        }
        let norm = (self.frames * self.n_query_points) as f64;
        self.bin_counts
            .iter()
            .scan(0u64, |acc, &c| {
                *acc += c;
                Some(*acc as f64 / norm)
            })
            .collect()
    }
}

//! Periodic cell lists and neighbor queries.
//!
//! Points of one batch are bucketed into a uniform grid of cells over a
//! (possibly periodic, 2D or 3D) box. Queries walk shells of cells around a
//! query point and stream [`NeighborBond`]s lazily:
//!
//! - ball queries return every point in a distance window `[r_min, r_max)`;
//! - nearest queries return the `k` closest points inside that window.
//!
//! ```ignore
//! use linkcell::{CellList, PeriodicBox, QueryArgs};
//!
//! let cl = CellList::build(PeriodicBox::cube(10.0)?, 2.0, &positions)?;
//! for bond in cl.query(positions[0], 0, &QueryArgs::ball(1.5).with_exclude_self(true))? {
//!     println!("{} -> {} at {}", bond.query_point_index, bond.point_index, bond.distance);
//! }
//! ```

pub mod adjacency;
pub mod api;
pub mod ball;
pub mod brute_force;
pub mod cell_list;
pub mod config;
pub mod domain;
pub mod error;
pub mod grid;
pub mod nearest;
pub mod neighbor_list;
pub mod query;
pub mod rdf;
pub mod shell;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

pub use adjacency::CellAdjacency;
pub use api::build_neighborlist;
pub use ball::BallQuery;
pub use cell_list::CellList;
pub use domain::{Domain, PeriodicBox};
pub use error::{BuildError, DomainError, Error, HistogramError, QueryError};
pub use grid::CellGrid;
pub use nearest::NearestQuery;
pub use neighbor_list::NeighborList;
pub use query::{NeighborBond, NeighborQueryIter, QueryArgs, QueryMode};
pub use rdf::Rdf;
pub use shell::ShellSequence;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Installs a `tracing` subscriber. `RUST_LOG` takes precedence over
/// `level`, which defaults to `info`. Calling it again does nothing.
pub fn init_logging(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_thread_ids(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging(Some("debug"));
        init_logging(None);
        tracing::info!("logging initialized");
    }
}

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Box matrix is not invertible")]
    NotInvertible,
    #[error("Box lengths must be positive and finite, got {0}")]
    InvalidLength(f64),
}

/// Configuration errors raised while building a [`crate::CellList`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Cell width must be positive and finite, got {0}")]
    InvalidCellWidth(f64),
    #[error(
        "Cannot generate a cell list where cell_width ({cell_width}) is larger than \
         half the box (plane distance {plane_distance})"
    )]
    CellWidthTooLarge { cell_width: f64, plane_distance: f64 },
    #[error("Cannot generate a cell list of 0 points")]
    NoPoints,
    #[error("At least one cell must be present")]
    NoCells,
    #[error("Cell grid {0}x{1}x{2} is too large to index")]
    TooManyCells(usize, usize, usize),
}

/// Errors raised when a query is created with invalid arguments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Invalid query mode provided to generic query function")]
    UnsupportedMode,
    #[error("r_max must be positive and finite, got {0}")]
    InvalidRMax(f64),
    #[error("r_min must be non-negative and finite, got {0}")]
    InvalidRMin(f64),
    #[error("r_min ({r_min}) must be smaller than r_max ({r_max})")]
    InvalidRange { r_min: f64, r_max: f64 },
    #[error("Nearest-neighbor queries require a positive num_neighbors")]
    MissingNumNeighbors,
    #[error("Adjacent-cell search needs r_max ({r_max}) <= cell width ({cell_width})")]
    RMaxExceedsCellWidth { r_max: f64, cell_width: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistogramError {
    #[error("Histogram needs at least one bin")]
    NoBins,
    #[error("Histogram range [{r_min}, {r_max}) is empty or not finite")]
    InvalidRange { r_min: f64, r_max: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Histogram(#[from] HistogramError),
}

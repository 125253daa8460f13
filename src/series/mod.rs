//! In-session time series: the append-only buffer the ingestion loop writes
//! and the projection the front end renders from.

pub mod buffer;
pub mod projection;

pub use buffer::{Reading, SeriesBuffer, SharedSeries};
pub use projection::{Axis, PlotProjection, PointSummary};

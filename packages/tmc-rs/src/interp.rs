use crate::error::{Result, TmcError};
use crate::types::{QueryGrid, TimeSeries};

/// Piecewise-linear interpolant over one channel's samples.
///
/// Queries must fall inside the sampled range; there is no extrapolation
/// and no clamping. A query that lands exactly on a sample timestamp
/// returns that sample's value unchanged.
pub struct Interpolator<'a> {
    series: &'a TimeSeries,
}

impl<'a> Interpolator<'a> {
    pub fn new(series: &'a TimeSeries) -> Result<Self> {
        if series.len() < 2 {
            return Err(TmcError::EmptySeriesError(
                "interpolation requires at least two samples".to_string(),
            ));
        }
        Ok(Self { series })
    }

    /// Interpolated value at a single query timestamp.
    pub fn value_at(&self, query: f64) -> Result<f64> {
        let timestamps = self.series.timestamps();
        let values = self.series.values();
        let min = timestamps[0];
        let max = timestamps[timestamps.len() - 1];
        if !query.is_finite() || query < min || query > max {
            return Err(TmcError::OutOfDomainError { query, min, max });
        }
        // First sample at or past the query; the domain check above keeps
        // this strictly inside 1..len when the query is not an exact hit
        // on the first sample.
        let idx = timestamps.partition_point(|&t| t < query);
        if timestamps[idx] == query {
            return Ok(values[idx]);
        }
        let (t0, t1) = (timestamps[idx - 1], timestamps[idx]);
        let (v0, v1) = (values[idx - 1], values[idx]);
        Ok(v0 + (query - t0) / (t1 - t0) * (v1 - v0))
    }

    /// Resample onto a query grid; one value per grid timestamp.
    pub fn resample(&self, grid: &QueryGrid) -> Result<Vec<f64>> {
        grid.timestamps().iter().map(|&t| self.value_at(t)).collect()
    }
}

use std::fmt;

use serde::Serialize;

use super::buffer::{SeriesBuffer, SharedSeries};

/// Which plotted quantity a series carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    Current,
    Power,
}

impl Axis {
    pub fn label(&self) -> &'static str {
        match self {
            Axis::Current => "Corriente (A)",
            Axis::Power => "Potencia (W)",
        }
    }
}

/// The three fields shown when a point on either plot is inspected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSummary {
    pub index: usize,
    pub time: f64,
    pub current: f64,
    pub power: f64,
}

impl fmt::Display for PointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tiempo: {:.3}s\nCorriente: {:.3}A\nPotencia: {:.3}W",
            self.time, self.current, self.power
        )
    }
}

type InspectHandler = Box<dyn FnMut(Option<PointSummary>) + Send>;

/// Read-only view of a session's buffer shaped for rendering.
///
/// Every call re-derives its output from the current buffer contents.
pub struct PlotProjection {
    series: SharedSeries,
    on_inspect: Option<InspectHandler>,
}

impl PlotProjection {
    pub fn new(series: SharedSeries) -> Self {
        Self {
            series,
            on_inspect: None,
        }
    }

    /// Registers the callback run by [`PlotProjection::click`].
    pub fn on_inspect<F>(&mut self, handler: F)
    where
        F: FnMut(Option<PointSummary>) + Send + 'static,
    {
        self.on_inspect = Some(Box::new(handler));
    }

    pub fn series_for(&self, axis: Axis) -> Vec<(f64, f64)> {
        self.with_buffer(|buffer| {
            let values = match axis {
                Axis::Current => buffer.currents(),
                Axis::Power => buffer.powers(),
            };
            buffer
                .times()
                .iter()
                .copied()
                .zip(values.iter().copied())
                .collect()
        })
    }

    pub fn locate(&self, query_time: f64) -> Option<PointSummary> {
        self.with_buffer(|buffer| {
            let index = buffer.nearest(query_time)?;
            let reading = buffer.get(index)?;
            Some(PointSummary {
                index,
                time: reading.timestamp,
                current: reading.current,
                power: reading.power,
            })
        })
    }

    /// Resolves a click at `query_time` and hands the result to the
    /// registered handler. `None` means "clear the selection".
    pub fn click(&mut self, query_time: f64) -> Option<PointSummary> {
        let summary = self.locate(query_time);
        if let Some(handler) = self.on_inspect.as_mut() {
            handler(summary);
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.with_buffer(SeriesBuffer::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_buffer<T>(&self, f: impl FnOnce(&SeriesBuffer) -> T) -> T {
        match self.series.read() {
            Ok(guard) => f(&*guard),
            Err(poisoned) => f(&*poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::series::Reading;

    fn projection_with(samples: &[(f64, f64, f64)]) -> PlotProjection {
        let series = SeriesBuffer::shared();
        {
            let mut buffer = series.write().unwrap();
            for &(timestamp, current, power) in samples {
                buffer.append(Reading {
                    timestamp,
                    current,
                    power,
                });
            }
        }
        PlotProjection::new(series)
    }

    #[test]
    fn series_follow_the_buffer() {
        let projection = projection_with(&[(0.0, 1.2, 5.4), (0.1, 1.25, 5.6)]);
        assert_eq!(
            projection.series_for(Axis::Current),
            vec![(0.0, 1.2), (0.1, 1.25)]
        );
        assert_eq!(
            projection.series_for(Axis::Power),
            vec![(0.0, 5.4), (0.1, 5.6)]
        );
    }

    #[test]
    fn series_reflect_appends_after_creation() {
        let series = SeriesBuffer::shared();
        let projection = PlotProjection::new(series.clone());
        assert!(projection.series_for(Axis::Current).is_empty());

        series.write().unwrap().append(Reading {
            timestamp: 0.3,
            current: 2.0,
            power: 8.0,
        });
        assert_eq!(projection.series_for(Axis::Power), vec![(0.3, 8.0)]);
    }

    #[test]
    fn locate_on_empty_is_none() {
        assert_eq!(projection_with(&[]).locate(1.0), None);
    }

    #[test]
    fn locate_formats_three_fields() {
        let projection = projection_with(&[(0.0, 1.0, 4.0), (1.0, 1.5, 6.25)]);
        let summary = projection.locate(0.9).unwrap();
        assert_eq!(summary.index, 1);
        assert_eq!(
            summary.to_string(),
            "Tiempo: 1.000s\nCorriente: 1.500A\nPotencia: 6.250W"
        );
    }

    #[test]
    fn click_reports_to_registered_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut projection = projection_with(&[(0.0, 1.0, 4.0)]);
        let sink = seen.clone();
        projection.on_inspect(move |summary| sink.lock().unwrap().push(summary));

        projection.click(0.2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].map(|s| s.index), Some(0));
    }

    #[test]
    fn click_on_empty_buffer_clears_selection() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut projection = projection_with(&[]);
        let sink = seen.clone();
        projection.on_inspect(move |summary| sink.lock().unwrap().push(summary));

        assert_eq!(projection.click(5.0), None);
        assert_eq!(*seen.lock().unwrap(), vec![None]);
    }
}

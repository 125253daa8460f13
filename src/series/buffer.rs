use std::sync::{Arc, RwLock};

use serde::Serialize;

/// One accepted sample. `timestamp` is seconds since the session started.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: f64,
    pub current: f64,
    pub power: f64,
}

/// Three index-aligned columns of the readings accepted this session.
///
/// `times[i]`, `currents[i]` and `powers[i]` always describe the same
/// reading, and the columns always have the same length.
#[derive(Debug, Default, Clone)]
pub struct SeriesBuffer {
    times: Vec<f64>,
    currents: Vec<f64>,
    powers: Vec<f64>,
}

/// Buffer handle shared between the ingestion loop (sole writer) and readers.
pub type SharedSeries = Arc<RwLock<SeriesBuffer>>;

impl SeriesBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedSeries {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn append(&mut self, reading: Reading) {
        self.times.push(reading.timestamp);
        self.currents.push(reading.current);
        self.powers.push(reading.power);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn currents(&self) -> &[f64] {
        &self.currents
    }

    pub fn powers(&self) -> &[f64] {
        &self.powers
    }

    pub fn get(&self, index: usize) -> Option<Reading> {
        Some(Reading {
            timestamp: *self.times.get(index)?,
            current: *self.currents.get(index)?,
            power: *self.powers.get(index)?,
        })
    }

    pub fn last(&self) -> Option<Reading> {
        self.len().checked_sub(1).and_then(|index| self.get(index))
    }

    /// Index of the entry whose time is closest to `query_time`.
    ///
    /// Exact ties go to the lower index. `None` when the buffer is empty or
    /// the query is NaN.
    pub fn nearest(&self, query_time: f64) -> Option<usize> {
        if query_time.is_nan() {
            return None;
        }
        let mut best: Option<(usize, f64)> = None;
        for (index, time) in self.times.iter().enumerate() {
            let distance = (time - query_time).abs();
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((index, distance)),
            }
        }
        best.map(|(index, _)| index)
    }
}

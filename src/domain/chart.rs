// Chart domain models - what the live chart for one device renders
use super::data_log::{DataLog, LogStatus};
use serde::Serialize;

pub const MAX_POINTS_PER_CHART: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    pub device_id: String,
    pub title: String,
    pub unit: String,
    pub warning_threshold: Option<f64>,
    pub critical_threshold: Option<f64>,
}

impl ChartSpec {
    pub fn new(device_id: String, title: String, unit: String) -> Self {
        Self {
            device_id,
            title,
            unit,
            warning_threshold: None,
            critical_threshold: None,
        }
    }

    pub fn with_thresholds(mut self, warning: Option<f64>, critical: Option<f64>) -> Self {
        self.warning_threshold = warning;
        self.critical_threshold = critical;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub time_ms: i64,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(time_ms: i64, value: f64) -> Self {
        Self { time_ms, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub average: f64,
}

impl ChartSummary {
    pub fn of(logs: &[DataLog]) -> Option<Self> {
        if logs.is_empty() {
            return None;
        }

        let (min, max, sum) = logs.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), log| (min.min(log.value), max.max(log.value), sum + log.value),
        );

        Some(Self {
            count: logs.len(),
            min,
            max,
            average: sum / logs.len() as f64,
        })
    }
}

/// Chart series ordered by time, bucketed down to `max_points`.
pub fn series_points(logs: &[DataLog], max_points: usize) -> Vec<TimeSeriesPoint> {
    let mut points: Vec<TimeSeriesPoint> = logs
        .iter()
        .map(|log| TimeSeriesPoint::new(log.timestamp, log.value))
        .collect();
    points.sort_by_key(|p| p.time_ms);
    downsample_points(points, max_points)
}

/// Downsample time series points using bucket averaging
fn downsample_points(points: Vec<TimeSeriesPoint>, max_points: usize) -> Vec<TimeSeriesPoint> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }

    let bucket_size = (points.len() as f64 / max_points as f64).ceil() as usize;
    let mut downsampled = Vec::with_capacity(max_points);

    for chunk in points.chunks(bucket_size) {
        // Use middle point's timestamp and average value
        let mid_idx = chunk.len() / 2;
        let avg_value = chunk.iter().map(|p| p.value).sum::<f64>() / chunk.len() as f64;
        downsampled.push(TimeSeriesPoint::new(chunk[mid_idx].time_ms, avg_value));
    }

    downsampled
}

/// Stand-in dataset so the chart renders when no backend is configured.
pub fn sample_dataset(device_id: &str, unit: &str, now_ms: i64) -> Vec<DataLog> {
    const SAMPLES: [(i64, f64, LogStatus); 4] = [
        (3_600_000, 25.0, LogStatus::Normal),
        (1_800_000, 30.0, LogStatus::Normal),
        (900_000, 35.0, LogStatus::Warning),
        (0, 40.0, LogStatus::Critical),
    ];

    SAMPLES
        .iter()
        .enumerate()
        .map(|(i, (age_ms, value, status))| DataLog {
            id: (i + 1).to_string(),
            timestamp: now_ms - age_ms,
            value: *value,
            unit: unit.to_string(),
            device_id: device_id.to_string(),
            status: *status,
            message: None,
        })
        .collect()
}

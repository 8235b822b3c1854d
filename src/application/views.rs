// Live views - each mounts one subscription and keeps the latest snapshot as render state
use crate::application::data_service::{Caller, DataService};
use crate::application::error::DataError;
use crate::application::subscription::SubscriptionHandle;
use crate::domain::alert::{unacknowledged_count, Alert};
use crate::domain::chart::{series_points, sample_dataset, ChartSpec, ChartSummary, TimeSeriesPoint, MAX_POINTS_PER_CHART};
use crate::domain::control_signal::{most_recent, Command, ControlSignal};
use crate::domain::data_log::DataLog;
use crate::domain::now_ms;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Number of signals the device panel lists.
pub const RECENT_SIGNALS: usize = 3;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsState {
    pub alerts: Vec<Alert>,
    pub unacknowledged: usize,
}

pub struct AlertsView {
    data: DataService,
    state: watch::Receiver<AlertsState>,
    _subscription: SubscriptionHandle,
}

impl AlertsView {
    pub fn mount(data: &DataService) -> Self {
        let (tx, state) = watch::channel(AlertsState::default());
        let subscription = data.subscribe_to_alerts(move |mut alerts| {
            alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            let unacknowledged = unacknowledged_count(&alerts);
            tx.send_replace(AlertsState { alerts, unacknowledged });
        });

        Self {
            data: data.clone(),
            state,
            _subscription: subscription,
        }
    }

    pub fn state(&self) -> AlertsState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AlertsState> {
        self.state.clone()
    }

    /// The list refreshes when the store echoes the change back.
    pub async fn acknowledge(&self, alert_id: &str) {
        self.data.acknowledge_alert(alert_id).await;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceControlState {
    pub device_id: String,
    pub signals: Vec<ControlSignal>,
    pub recent: Vec<ControlSignal>,
}

pub struct DeviceControlView {
    device_id: String,
    data: DataService,
    state: watch::Receiver<DeviceControlState>,
    _subscription: SubscriptionHandle,
}

impl DeviceControlView {
    pub fn mount(data: &DataService, device_id: &str) -> Self {
        let (tx, state) = watch::channel(DeviceControlState {
            device_id: device_id.to_string(),
            ..Default::default()
        });
        let id = device_id.to_string();
        let subscription = data.subscribe_to_control_signals(device_id, move |signals| {
            tx.send_replace(DeviceControlState {
                device_id: id.clone(),
                recent: most_recent(&signals, RECENT_SIGNALS),
                signals,
            });
        });

        Self {
            device_id: device_id.to_string(),
            data: data.clone(),
            state,
            _subscription: subscription,
        }
    }

    pub fn state(&self) -> DeviceControlState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<DeviceControlState> {
        self.state.clone()
    }

    pub async fn send(&self, command: Command, caller: Option<&Caller>) -> Result<ControlSignal, DataError> {
        self.data.send_control_signal(&self.device_id, command, caller).await
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartFrame {
    pub spec: ChartSpec,
    /// False while showing the stand-in dataset.
    pub live: bool,
    pub playing: bool,
    pub points: Vec<TimeSeriesPoint>,
    pub summary: Option<ChartSummary>,
    pub last_update: Option<i64>,
}

impl ChartFrame {
    fn empty(spec: ChartSpec, live: bool) -> Self {
        Self {
            spec,
            live,
            playing: live,
            points: Vec::new(),
            summary: None,
            last_update: None,
        }
    }

    fn apply(&mut self, logs: &[DataLog], at: i64) {
        self.points = series_points(logs, MAX_POINTS_PER_CHART);
        self.summary = ChartSummary::of(logs);
        self.last_update = Some(at);
    }
}

/// Live chart for one device. Pausing detaches the subscription and
/// resuming attaches a fresh one. Without a backend the chart shows a
/// fixed sample dataset instead.
pub struct DataVisualization {
    data: Option<DataService>,
    frame: Arc<watch::Sender<ChartFrame>>,
    subscription: Option<SubscriptionHandle>,
}

impl DataVisualization {
    pub fn mount(data: Option<DataService>, spec: ChartSpec) -> Self {
        let live = data.is_some();
        let mut frame = ChartFrame::empty(spec, live);
        if !live {
            let now = now_ms();
            let samples = sample_dataset(&frame.spec.device_id, &frame.spec.unit, now);
            frame.apply(&samples, now);
        }

        let (frame, _) = watch::channel(frame);
        let mut view = Self {
            data,
            frame: Arc::new(frame),
            subscription: None,
        };
        view.attach();
        view
    }

    fn attach(&mut self) {
        let Some(data) = &self.data else {
            return;
        };

        let frame = self.frame.clone();
        let device_id = frame.borrow().spec.device_id.clone();
        self.subscription = Some(data.subscribe_to_data(&device_id, move |logs| {
            frame.send_modify(|f| f.apply(&logs, now_ms()));
        }));
    }

    pub fn is_playing(&self) -> bool {
        self.frame.borrow().playing
    }

    /// Flip between playing and paused; returns whether the chart now plays.
    /// A chart without a backend has nothing to pause.
    pub fn toggle_play(&mut self) -> bool {
        if self.data.is_none() {
            return false;
        }

        if let Some(mut subscription) = self.subscription.take() {
            subscription.detach();
            self.frame.send_modify(|f| f.playing = false);
            false
        } else {
            self.frame.send_modify(|f| f.playing = true);
            self.attach();
            true
        }
    }

    /// Clear the plotted data until the next snapshot arrives.
    pub fn reset(&self) {
        self.frame.send_modify(|f| {
            f.points.clear();
            f.summary = None;
        });
    }

    pub fn frame(&self) -> ChartFrame {
        self.frame.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ChartFrame> {
        self.frame.subscribe()
    }
}

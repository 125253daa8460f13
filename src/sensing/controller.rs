use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use tokio::{sync::Mutex, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::{
    db::DeviceId,
    series::{PlotProjection, SharedSeries},
};

use super::{
    link::DeviceLink,
    loop_worker::polling_loop,
    monitor::{Monitor, MonitorError, MonitorStatus, Session},
    sink::ReadingSink,
};

/// Owns the [`Monitor`] and the task that ticks it.
pub struct MonitorController {
    monitor: Arc<Mutex<Monitor>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    poll_interval: Duration,
}

impl MonitorController {
    pub fn new(sink: Arc<dyn ReadingSink>, poll_interval: Duration) -> Self {
        Self {
            monitor: Arc::new(Mutex::new(Monitor::new(sink))),
            handle: None,
            cancel_token: None,
            poll_interval,
        }
    }

    /// Starts a session on `link` and begins ticking. Returns the session's
    /// buffer for rendering.
    pub async fn start(
        &mut self,
        link: Option<Box<dyn DeviceLink>>,
        device_id: Option<DeviceId>,
    ) -> Result<SharedSeries, MonitorError> {
        let series = {
            let mut monitor = self.monitor.lock().await;
            monitor.start(link, device_id)?.series()
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(polling_loop(
            Arc::clone(&self.monitor),
            self.poll_interval,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        info!("Polling every {:?}", self.poll_interval);
        Ok(series)
    }

    /// Stops polling and returns the finished session, if there was one.
    ///
    /// Waits for an in-flight tick to finish, never longer than one period.
    pub async fn stop(&mut self) -> Result<Option<Session>> {
        let session = self.monitor.lock().await.stop();
        self.cancel_loop();
        self.join_loop().await?;
        Ok(session)
    }

    pub async fn status(&self) -> MonitorStatus {
        self.monitor.lock().await.status()
    }

    /// Projection over the active session, `None` while idle.
    pub async fn projection(&self) -> Option<PlotProjection> {
        self.monitor.lock().await.session().map(Session::projection)
    }

    fn cancel_loop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }

    async fn join_loop(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("polling loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensing::{link::testing::ScriptedLink, sink::testing::RecordingSink};
    use crate::series::Axis;

    fn controller(sink: Arc<RecordingSink>) -> MonitorController {
        MonitorController::new(sink, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn ticks_until_stopped() {
        let sink = Arc::new(RecordingSink::default());
        let mut controller = controller(sink.clone());
        let link = ScriptedLink::new();

        let series = controller
            .start(Some(Box::new(link.clone())), Some(2))
            .await
            .unwrap();
        assert_eq!(controller.status().await, MonitorStatus::Polling);

        link.feed("Irms:1.20A,Potencia:5.40W\nnoise\nIrms:1.25A,Potencia:5.60W\n");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let projection = controller.projection().await.unwrap();
        assert_eq!(projection.series_for(Axis::Current).len(), 2);

        let session = controller.stop().await.unwrap().unwrap();
        assert_eq!(session.len(), 2);
        assert_eq!(series.read().unwrap().powers(), &[5.40, 5.60]);
        assert_eq!(sink.calls().len(), 2);
        assert_eq!(controller.status().await, MonitorStatus::Idle);

        // Input after stop is never read.
        link.feed("Irms:9.0A,Potencia:9.0W\n");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(series.read().unwrap().len(), 2);
        assert!(controller.projection().await.is_none());
    }

    #[tokio::test]
    async fn start_without_device_fails_and_stays_idle() {
        let mut controller = controller(Arc::new(RecordingSink::default()));
        let result = controller.start(None, Some(1)).await;
        assert!(matches!(result, Err(MonitorError::NotConnected)));
        assert_eq!(controller.status().await, MonitorStatus::Idle);
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_noop() {
        let mut controller = controller(Arc::new(RecordingSink::default()));
        assert!(controller.stop().await.unwrap().is_none());
        assert!(controller.stop().await.unwrap().is_none());
        assert_eq!(controller.status().await, MonitorStatus::Idle);
    }

    #[tokio::test]
    async fn can_restart_after_stop() {
        let mut controller = controller(Arc::new(RecordingSink::default()));
        controller
            .start(Some(Box::new(ScriptedLink::new())), None)
            .await
            .unwrap();
        controller.stop().await.unwrap();

        let link = ScriptedLink::new();
        let series = controller
            .start(Some(Box::new(link.clone())), None)
            .await
            .unwrap();
        link.feed("Irms:0.1A,Potencia:0.4W\n");
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.stop().await.unwrap();
        assert_eq!(series.read().unwrap().len(), 1);
    }
}

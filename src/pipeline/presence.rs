use std::{sync::Arc, thread, time::Duration};

use crossbeam_channel::{Sender, bounded, select, tick};

use super::sink::ResultSink;
use crate::{
    sensor::{Sensor, SensorSession},
    types::{
        JointTrackingState, JointType, PresenceStatus, Skeleton, SkeletonFrame,
        SkeletonTrackingState,
    },
};

/// Joints that must all be tracked for a person to count as fully in view.
pub const REQUIRED_JOINTS: [JointType; 4] = [
    JointType::Head,
    JointType::ShoulderCenter,
    JointType::ShoulderLeft,
    JointType::ShoulderRight,
];

#[derive(Clone, Copy, Debug)]
pub struct PresenceMonitor {
    wait: Duration,
}

impl PresenceMonitor {
    pub fn new(wait: Duration) -> Self {
        PresenceMonitor { wait }
    }

    /// One polling cycle. `None` means no new skeleton data arrived in time and
    /// the previous status should stay up.
    pub fn tick(&self, sensor: Option<&dyn Sensor>) -> Option<PresenceStatus> {
        let Some(sensor) = sensor else {
            return Some(PresenceStatus::NoSensor);
        };

        let frame = sensor.open_skeleton_frame(self.wait)?;
        Some(evaluate(&frame))
    }
}

pub fn evaluate(frame: &SkeletonFrame) -> PresenceStatus {
    frame
        .skeletons
        .iter()
        .filter(|skeleton| skeleton.tracking_state == SkeletonTrackingState::Tracked)
        .map(|skeleton| {
            if required_joints_tracked(skeleton) {
                PresenceStatus::PersonFullyVisible
            } else {
                PresenceStatus::PersonPartiallyVisible
            }
        })
        .last()
        .unwrap_or(PresenceStatus::NoPersonDetected)
}

fn required_joints_tracked(skeleton: &Skeleton) -> bool {
    REQUIRED_JOINTS
        .iter()
        .all(|&joint_type| {
            skeleton.joints[joint_type].tracking_state == JointTrackingState::Tracked
        })
}

#[derive(Debug)]
pub struct PresenceTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PresenceTimer {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PresenceTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Polls the session's sensor right away and then every `period` on a
/// dedicated thread, separate from frame-ready processing.
pub fn start_presence_monitor(
    session: Arc<SensorSession>,
    monitor: PresenceMonitor,
    period: Duration,
    sink: Arc<dyn ResultSink>,
) -> PresenceTimer {
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let ticker = tick(period);

    let handle = thread::spawn(move || {
        log::info!("presence monitor polling every {period:?}");
        let mut last = None;
        poll(&session, &monitor, sink.as_ref(), &mut last);
        loop {
            select! {
                recv(stop_rx) -> _ => break,
                recv(ticker) -> _ => poll(&session, &monitor, sink.as_ref(), &mut last),
            }
        }
    });

    PresenceTimer {
        stop_tx: Some(stop_tx),
        handle: Some(handle),
    }
}

fn poll(
    session: &SensorSession,
    monitor: &PresenceMonitor,
    sink: &dyn ResultSink,
    last: &mut Option<PresenceStatus>,
) {
    let published = session.with_current_sensor(|sensor| {
        let status = monitor.tick(sensor)?;
        sink.present_status(status);
        Some(status)
    });

    match published {
        None => log::trace!("no skeleton frame this tick"),
        Some(status) if *last != Some(status) => {
            log::debug!("presence: {status:?}");
            *last = Some(status);
        }
        Some(_) => {}
    }
}

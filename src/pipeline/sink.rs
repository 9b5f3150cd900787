use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use super::drawing::DrawCommand;
use crate::types::{Bgr32Image, ColorFrame, PresenceStatus};

/// Where finished results go. Implementations must not block the producer.
pub trait ResultSink: Send + Sync + 'static {
    fn present_depth(&self, image: Bgr32Image);

    fn present_color(&self, frame: ColorFrame);

    fn present_skeletons(&self, drawing: Arc<[DrawCommand]>);

    fn present_status(&self, status: PresenceStatus);
}

/// Receiving ends for a presenter thread.
pub struct Presentation {
    pub depth_rx: Receiver<Bgr32Image>,
    pub color_rx: Receiver<ColorFrame>,
    pub skeleton_rx: Receiver<Arc<[DrawCommand]>>,
    pub status_rx: Receiver<PresenceStatus>,
}

/// Hands results over crossbeam channels. Frames are dropped when the
/// presenter is still busy with the previous one; status changes are queued.
#[derive(Clone)]
pub struct ChannelSink {
    depth_tx: Sender<Bgr32Image>,
    color_tx: Sender<ColorFrame>,
    skeleton_tx: Sender<Arc<[DrawCommand]>>,
    status_tx: Sender<PresenceStatus>,
}

impl ChannelSink {
    pub fn new() -> (Self, Presentation) {
        let (depth_tx, depth_rx) = bounded(1);
        let (color_tx, color_rx) = bounded(1);
        let (skeleton_tx, skeleton_rx) = bounded(1);
        let (status_tx, status_rx) = unbounded();

        (
            ChannelSink {
                depth_tx,
                color_tx,
                skeleton_tx,
                status_tx,
            },
            Presentation {
                depth_rx,
                color_rx,
                skeleton_rx,
                status_rx,
            },
        )
    }
}

impl ResultSink for ChannelSink {
    fn present_depth(&self, image: Bgr32Image) {
        let _ = self.depth_tx.try_send(image);
    }

    fn present_color(&self, frame: ColorFrame) {
        let _ = self.color_tx.try_send(frame);
    }

    fn present_skeletons(&self, drawing: Arc<[DrawCommand]>) {
        let _ = self.skeleton_tx.try_send(drawing);
    }

    fn present_status(&self, status: PresenceStatus) {
        let _ = self.status_tx.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_frame_slot_drops_instead_of_blocking() {
        let (sink, presentation) = ChannelSink::new();
        sink.present_depth(Bgr32Image::new(1, 1));
        sink.present_depth(Bgr32Image::new(2, 2));

        let first = presentation.depth_rx.try_recv().unwrap();
        assert_eq!(first.width, 1);
        assert!(presentation.depth_rx.try_recv().is_err());
    }

    #[test]
    fn status_updates_are_queued() {
        let (sink, presentation) = ChannelSink::new();
        sink.present_status(PresenceStatus::NoPersonDetected);
        sink.present_status(PresenceStatus::PersonFullyVisible);

        let received: Vec<_> = presentation.status_rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                PresenceStatus::NoPersonDetected,
                PresenceStatus::PersonFullyVisible
            ]
        );
    }

    #[test]
    fn disconnected_presenter_is_ignored() {
        let (sink, presentation) = ChannelSink::new();
        drop(presentation);
        sink.present_status(PresenceStatus::NoSensor);
        sink.present_skeletons(Arc::from(Vec::new()));
    }
}

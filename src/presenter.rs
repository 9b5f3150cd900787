use std::{fs, path::Path, time::Instant};

use anyhow::{Context, Result};
use crossbeam_channel::select;
use image::{DynamicImage, RgbaImage};

use crate::{
    pipeline::{DrawCommand, Presentation, rasterize},
    types::{Bgr32Image, ColorFrame, PresenceStatus},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCounts {
    pub depth: u64,
    pub color: u64,
    pub skeleton: u64,
}

/// Headless stand-in for a window: keeps the latest image of each kind and
/// the status line.
pub struct Presenter {
    width: u32,
    height: u32,
    status: PresenceStatus,
    depth: Option<RgbaImage>,
    color: Option<RgbaImage>,
    skeletons: Option<RgbaImage>,
    counts: FrameCounts,
}

impl Presenter {
    pub fn new(width: u32, height: u32) -> Self {
        Presenter {
            width,
            height,
            status: PresenceStatus::Initializing,
            depth: None,
            color: None,
            skeletons: None,
            counts: FrameCounts::default(),
        }
    }

    pub fn status(&self) -> PresenceStatus {
        self.status
    }

    pub fn counts(&self) -> FrameCounts {
        self.counts
    }

    pub fn show_depth(&mut self, image: &Bgr32Image) -> Result<()> {
        self.depth = Some(image.to_rgba_image()?);
        self.counts.depth += 1;
        Ok(())
    }

    pub fn show_color(&mut self, frame: &ColorFrame) -> Result<()> {
        self.color = Some(frame.to_rgba_image()?);
        self.counts.color += 1;
        Ok(())
    }

    pub fn show_skeletons(&mut self, drawing: &[DrawCommand]) {
        self.skeletons = Some(rasterize(drawing, self.width, self.height));
        self.counts.skeleton += 1;
    }

    /// Returns whether the status line changed.
    pub fn show_status(&mut self, status: PresenceStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        log::info!("status: {}", status.display_text().replace('\n', " "));
        true
    }

    /// Presents results until `deadline` or until every sender is gone.
    pub fn run(&mut self, presentation: &Presentation, deadline: Instant) {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            select! {
                recv(presentation.depth_rx) -> msg => match msg {
                    Ok(image) => {
                        if let Err(err) = self.show_depth(&image) {
                            log::warn!("dropping depth image: {err:?}");
                        }
                    }
                    Err(_) => break,
                },
                recv(presentation.color_rx) -> msg => match msg {
                    Ok(frame) => {
                        if let Err(err) = self.show_color(&frame) {
                            log::warn!("dropping color frame {}: {err:?}", frame.frame_number);
                        }
                    }
                    Err(_) => break,
                },
                recv(presentation.skeleton_rx) -> msg => match msg {
                    Ok(drawing) => self.show_skeletons(&drawing),
                    Err(_) => break,
                },
                recv(presentation.status_rx) -> msg => match msg {
                    Ok(status) => {
                        self.show_status(status);
                    }
                    Err(_) => break,
                },
                default(remaining) => break,
            }
        }
    }

    /// Applies any status updates already queued, without waiting.
    pub fn drain_status(&mut self, presentation: &Presentation) {
        while let Ok(status) = presentation.status_rx.try_recv() {
            self.show_status(status);
        }
    }

    pub fn save_snapshots(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;

        if let Some(depth) = &self.depth {
            save(depth, &dir.join("depth.png"))?;
        }
        if let Some(skeletons) = &self.skeletons {
            save(skeletons, &dir.join("skeletons.png"))?;
        }
        if let Some(color) = &self.color {
            // JPEG carries no alpha channel.
            let rgb = DynamicImage::ImageRgba8(color.clone()).to_rgb8();
            let path = dir.join("color.jpg");
            rgb.save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        log::info!("snapshots written to {}", dir.display());
        Ok(())
    }
}

fn save(image: &RgbaImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

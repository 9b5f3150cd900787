use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use image::{Rgba, RgbaImage};

use super::projector::ScreenPoint;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pen {
    pub color: Rgba<u8>,
    pub thickness: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Rectangle {
        fill: Rgba<u8>,
        origin: ScreenPoint,
        width: f32,
        height: f32,
    },
    Line {
        pen: Pen,
        from: ScreenPoint,
        to: ScreenPoint,
    },
    Ellipse {
        fill: Rgba<u8>,
        center: ScreenPoint,
        radius: f32,
    },
}

#[derive(Debug)]
struct Committed {
    commands: Arc<[DrawCommand]>,
    generation: u64,
}

/// Retained drawing shared between the skeleton producer and presenters.
///
/// Writers go through `open`, which serializes them and publishes their
/// commands only on `commit`. Readers always see a whole frame.
#[derive(Clone, Debug)]
pub struct DrawingSurface {
    writer: Arc<Mutex<()>>,
    committed: Arc<Mutex<Committed>>,
}

impl DrawingSurface {
    pub fn new() -> Self {
        DrawingSurface {
            writer: Arc::new(Mutex::new(())),
            committed: Arc::new(Mutex::new(Committed {
                commands: Arc::from(Vec::new()),
                generation: 0,
            })),
        }
    }

    pub fn open(&self) -> DrawingContext<'_> {
        DrawingContext {
            surface: self,
            _writer: self.writer.lock().unwrap_or_else(PoisonError::into_inner),
            commands: Vec::new(),
            committed: false,
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> Arc<[DrawCommand]> {
        self.lock_committed().commands.clone()
    }

    /// Number of frames committed so far.
    pub fn generation(&self) -> u64 {
        self.lock_committed().generation
    }

    fn lock_committed(&self) -> MutexGuard<'_, Committed> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, commands: Vec<DrawCommand>) -> Arc<[DrawCommand]> {
        let commands: Arc<[DrawCommand]> = Arc::from(commands);
        let mut committed = self.lock_committed();
        committed.commands = commands.clone();
        committed.generation += 1;
        commands
    }
}

impl Default for DrawingSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame's worth of drawing. Dropping it without `commit` discards it.
pub struct DrawingContext<'a> {
    surface: &'a DrawingSurface,
    _writer: MutexGuard<'a, ()>,
    commands: Vec<DrawCommand>,
    committed: bool,
}

impl DrawingContext<'_> {
    pub fn draw_rectangle(&mut self, fill: Rgba<u8>, origin: ScreenPoint, width: f32, height: f32) {
        self.commands.push(DrawCommand::Rectangle {
            fill,
            origin,
            width,
            height,
        });
    }

    pub fn draw_line(&mut self, pen: Pen, from: ScreenPoint, to: ScreenPoint) {
        self.commands.push(DrawCommand::Line { pen, from, to });
    }

    pub fn draw_ellipse(&mut self, fill: Rgba<u8>, center: ScreenPoint, radius: f32) {
        self.commands.push(DrawCommand::Ellipse {
            fill,
            center,
            radius,
        });
    }

    #[allow(dead_code)]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn commit(mut self) -> Arc<[DrawCommand]> {
        self.committed = true;
        let commands = mem::take(&mut self.commands);
        self.surface.publish(commands)
    }
}

impl Drop for DrawingContext<'_> {
    fn drop(&mut self) {
        if !self.committed {
            log::trace!("discarding {} uncommitted draw commands", self.commands.len());
        }
    }
}

/// Renders committed commands into an RGBA image for display. Shapes are
/// clipped to the image.
pub fn rasterize(commands: &[DrawCommand], width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    for command in commands {
        match command {
            DrawCommand::Rectangle {
                fill,
                origin,
                width,
                height,
            } => {
                let top = origin.y.floor() as i32;
                let bottom = (origin.y + height).ceil() as i32;
                let left = origin.x.floor() as i32;
                let right = (origin.x + width).ceil() as i32 - 1;
                for y in top..bottom {
                    fill_span(&mut image, y, left, right, *fill);
                }
            }
            DrawCommand::Line { pen, from, to } => stroke(&mut image, *from, *to, *pen),
            DrawCommand::Ellipse {
                fill,
                center,
                radius,
            } => stamp_disc(
                &mut image,
                center.x as i32,
                center.y as i32,
                radius.round() as i32,
                *fill,
            ),
        }
    }
    image
}

/// Walks the segment one pixel step along its major axis and stamps a disc
/// sized to the pen at every step.
fn stroke(image: &mut RgbaImage, from: ScreenPoint, to: ScreenPoint, pen: Pen) {
    let radius = (pen.thickness.round() as i32).max(1).saturating_sub(1) / 2;
    let (x0, y0) = (from.x.trunc(), from.y.trunc());
    let (dx, dy) = (to.x.trunc() - x0, to.y.trunc() - y0);
    let steps = dx.abs().max(dy.abs()) as i32;

    for step in 0..=steps {
        let t = if steps == 0 {
            0.0
        } else {
            step as f32 / steps as f32
        };
        let x = (x0 + dx * t).round() as i32;
        let y = (y0 + dy * t).round() as i32;
        stamp_disc(image, x, y, radius, pen.color);
    }
}

fn stamp_disc(image: &mut RgbaImage, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
    let radius = radius.max(0);
    for dy in -radius..=radius {
        let half = ((radius * radius - dy * dy) as f32).sqrt() as i32;
        fill_span(image, cy + dy, cx - half, cx + half, color);
    }
}

/// Fills row `y` from `x0` to `x1` inclusive.
fn fill_span(image: &mut RgbaImage, y: i32, x0: i32, x1: i32, color: Rgba<u8>) {
    if y < 0 || y >= image.height() as i32 {
        return;
    }
    let first = x0.max(0);
    let last = x1.min(image.width() as i32 - 1);
    for x in first..=last {
        image.put_pixel(x as u32, y as u32, color);
    }
}

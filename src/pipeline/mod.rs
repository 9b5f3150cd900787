pub mod depth;
pub mod drawing;
pub mod presence;
pub mod projector;
pub mod rgba_converter;
pub mod sensor_stream;
pub mod sink;
pub mod skeleton;

// Re-exports for convenience
pub use drawing::{DrawCommand, rasterize};
pub use presence::{PresenceMonitor, start_presence_monitor};
pub use sink::{ChannelSink, Presentation, ResultSink};
pub use skeleton::RenderStyle;

//! Rendering: drawing surface, shared widgets and the compositor loop

pub mod canvas;
pub mod compositor;
pub mod context;
pub mod widgets;

pub use canvas::{lighten, rgb, text_width, truncate, wrap, Canvas, FontSize, TextRun};
pub use compositor::{Compositor, CompositorConfig, CompositorStats, TickOutcome};
pub use context::{PageSettings, RenderContext};

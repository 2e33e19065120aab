//! Canvas-side state for vocanvas: the display state the server's visual batches
//! merge into, and the speech mark log that drives incremental reveal.

pub mod client;
pub mod display;
pub mod marks;

pub use client::{channel, run_canvas, CanvasClient, CanvasEvent, CanvasEvents, CanvasHandle, RenderHost};
pub use display::{apply_updates, DisplayState};
pub use marks::{MarkLog, MarkPhase};

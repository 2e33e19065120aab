//! Umbrella crate for vocanvas.
//!
//! Re-exports the server-side response engine, the canvas-side state machines and
//! the wire types they share, so downstream code can depend on a single crate name.

pub use vocanvas_canvas as canvas;
pub use vocanvas_engine as engine;
pub use vocanvas_protocol as protocol;

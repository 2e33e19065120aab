//! Glue between the host surface's callbacks and the two reducers.
//!
//! The host registers [`CanvasHandle::on_update`] and [`CanvasHandle::on_tts_mark`]
//! as its callbacks. Both push onto one ordered event stream that
//! [`run_canvas`] drains, so each event is fully handled before the next.

use crate::display::DisplayState;
use crate::marks::MarkLog;
use tokio::sync::mpsc;
use vocanvas_protocol::Fragment;

/// Consumer of the two independent canvas event streams.
pub trait CanvasEvents {
    fn on_visual_batch(&mut self, fragments: &[Fragment]);
    fn on_marker(&mut self, mark: &str);
}

/// The surface that draws the current state.
pub trait RenderHost {
    fn render(&mut self, display: &DisplayState, marks: &MarkLog);
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    VisualBatch(Vec<Fragment>),
    Mark(String),
}

#[derive(Debug)]
pub struct CanvasClient<H> {
    display: DisplayState,
    marks: MarkLog,
    host: Option<H>,
    pending: Vec<Fragment>,
}

impl<H> Default for CanvasClient<H> {
    fn default() -> Self {
        Self {
            display: DisplayState::default(),
            marks: MarkLog::default(),
            host: None,
            pending: Vec::new(),
        }
    }
}

impl<H: RenderHost> CanvasClient<H> {
    /// A client with no surface yet; visual batches are buffered until [`attach`].
    ///
    /// [`attach`]: CanvasClient::attach
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(host: H) -> Self {
        let mut client = Self::new();
        client.attach(host);
        client
    }

    /// Installs the surface, applies anything buffered as one batch and renders once.
    pub fn attach(&mut self, host: H) {
        self.host = Some(host);
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            tracing::debug!(fragments = pending.len(), "applying buffered canvas updates");
            self.display = self.display.apply_updates(&pending);
        }
        self.render();
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn marks(&self) -> &MarkLog {
        &self.marks
    }

    pub fn host(&self) -> Option<&H> {
        self.host.as_ref()
    }

    pub fn handle(&mut self, event: CanvasEvent) {
        match event {
            CanvasEvent::VisualBatch(fragments) => self.on_visual_batch(&fragments),
            CanvasEvent::Mark(mark) => self.on_marker(&mark),
        }
    }

    fn render(&mut self) {
        if let Some(host) = self.host.as_mut() {
            host.render(&self.display, &self.marks);
        }
    }
}

impl<H: RenderHost> CanvasEvents for CanvasClient<H> {
    fn on_visual_batch(&mut self, fragments: &[Fragment]) {
        if self.host.is_none() {
            tracing::debug!(fragments = fragments.len(), "canvas not attached, buffering update");
            self.pending.extend_from_slice(fragments);
            return;
        }
        self.display = self.display.apply_updates(fragments);
        self.render();
    }

    fn on_marker(&mut self, mark: &str) {
        self.marks = std::mem::take(&mut self.marks).on_mark(mark);
        self.render();
    }
}

/// Sending side of the canvas event stream, handed to the host's callbacks.
#[derive(Debug, Clone)]
pub struct CanvasHandle {
    tx: mpsc::UnboundedSender<CanvasEvent>,
}

impl CanvasHandle {
    /// Returns `false` once the client has stopped; the update is dropped.
    pub fn on_update(&self, fragments: Vec<Fragment>) -> bool {
        self.send(CanvasEvent::VisualBatch(fragments))
    }

    pub fn on_tts_mark(&self, mark: impl Into<String>) -> bool {
        self.send(CanvasEvent::Mark(mark.into()))
    }

    fn send(&self, event: CanvasEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(event = ?err.0, "canvas client gone, dropping event");
                false
            }
        }
    }
}

pub fn channel() -> (CanvasHandle, mpsc::UnboundedReceiver<CanvasEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CanvasHandle { tx }, rx)
}

/// Drains `events` into `client` until every handle is dropped, then returns it.
pub async fn run_canvas<H: RenderHost>(
    mut client: CanvasClient<H>,
    mut events: mpsc::UnboundedReceiver<CanvasEvent>,
) -> CanvasClient<H> {
    while let Some(event) = events.recv().await {
        client.handle(event);
    }
    client
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marks::MarkPhase;
    use serde_json::{json, Value};

    #[derive(Debug, Default)]
    struct Recorder {
        frames: Vec<(DisplayState, Vec<String>)>,
    }

    impl RenderHost for Recorder {
        fn render(&mut self, display: &DisplayState, marks: &MarkLog) {
            self.frames.push((display.clone(), marks.entries().to_vec()));
        }
    }

    fn frag(v: Value) -> Fragment {
        match v {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn frames(client: &CanvasClient<Recorder>) -> usize {
        client.host().map(|h| h.frames.len()).unwrap_or(0)
    }

    #[test]
    fn one_render_per_batch() {
        let mut client = CanvasClient::attached(Recorder::default());
        let before = frames(&client);
        client.on_visual_batch(&[
            frag(json!({"scene": "number"})),
            frag(json!({"number": 1})),
            frag(json!({"number": 2})),
        ]);
        assert_eq!(frames(&client), before + 1);
        assert_eq!(client.display().get("number"), Some(&json!(2)));

        let last = &client.host().unwrap().frames.last().unwrap().0;
        assert_eq!(last.scene(), Some("number"));
    }

    #[test]
    fn updates_before_attach_are_buffered() {
        let mut client: CanvasClient<Recorder> = CanvasClient::new();
        client.on_visual_batch(&[frag(json!({"scene": "color", "color": "red"}))]);
        client.on_visual_batch(&[frag(json!({"color": "blue"}))]);
        assert_eq!(client.display(), &DisplayState::default());

        client.attach(Recorder::default());
        assert_eq!(frames(&client), 1);
        assert_eq!(client.display().get("color"), Some(&json!("blue")));
        assert_eq!(client.display().scene(), Some("color"));
    }

    #[test]
    fn marks_render_and_reset_per_utterance() {
        let mut client = CanvasClient::attached(Recorder::default());
        for mark in ["START", "number-1", "number-2", "END"] {
            client.on_marker(mark);
        }
        assert_eq!(client.marks().visible().collect::<Vec<_>>(), ["number-1", "number-2"]);

        client.on_marker("START");
        client.on_marker("number-9");
        assert_eq!(client.marks().entries(), ["START", "number-9"]);
        assert_eq!(frames(&client), 1 + 6);
    }

    #[test]
    fn marks_do_not_touch_display_and_batches_do_not_touch_marks() {
        let mut client = CanvasClient::attached(Recorder::default());
        client.on_marker("START");
        client.on_visual_batch(&[frag(json!({"scene": "welcome"}))]);
        client.on_marker("a");
        assert_eq!(client.marks().entries(), ["START", "a"]);
        assert_eq!(client.display().scene(), Some("welcome"));
    }

    #[test]
    fn attaching_mid_utterance_shows_marks_so_far() {
        let mut client: CanvasClient<Recorder> = CanvasClient::new();
        client.on_marker("number-1");
        client.on_marker("number-2");
        client.attach(Recorder::default());

        let frames = &client.host().unwrap().frames;
        assert_eq!(frames.last().unwrap().1, ["number-1", "number-2"]);
    }

    #[tokio::test]
    async fn event_loop_applies_in_order() {
        let (handle, events) = channel();
        let task = tokio::spawn(run_canvas(CanvasClient::attached(Recorder::default()), events));

        assert!(handle.on_tts_mark("stale"));
        assert!(handle.on_update(vec![frag(json!({"scene": "number", "number": 2}))]));
        assert!(handle.on_tts_mark("early"));
        assert!(handle.on_tts_mark("START"));
        assert!(handle.on_tts_mark("number-1"));
        assert!(handle.on_tts_mark("number-2"));
        assert!(handle.on_tts_mark("END"));
        drop(handle);

        let client = task.await.unwrap();
        assert_eq!(client.display().get("number"), Some(&json!(2)));
        assert_eq!(client.marks().entries(), ["START", "number-1", "number-2", "END"]);
        assert!(client.marks().finished());
        assert_eq!(client.marks().phase(), MarkPhase::Accumulating);
    }

    #[tokio::test]
    async fn handle_reports_closed_client() {
        let (handle, events) = channel();
        drop(events);
        assert!(!handle.on_tts_mark("START"));
        assert!(!handle.on_update(Vec::new()));
    }
}

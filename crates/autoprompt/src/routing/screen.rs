//! Screen sinks: where decoded output goes for display.
//!
//! Escape-sequence interpretation and the cell grid belong to the sink. The
//! router only guarantees that text arrives in order, already decoded, with
//! invalid UTF-8 replaced.

use std::io::Write;

use autoprompt_pty::WindowSize;

/// Receives decoded session output.
pub trait ScreenSink: Send {
    /// Append decoded output.
    fn feed(&mut self, text: &str);

    /// The terminal geometry changed.
    fn resize(&mut self, cols: u16, rows: u16) {
        let _ = (cols, rows);
    }

    /// The sink's current geometry, if it has one.
    ///
    /// When present the router sizes the session to it before spawning.
    fn size(&self) -> Option<WindowSize> {
        None
    }
}

impl<S: ScreenSink + ?Sized> ScreenSink for Box<S> {
    fn feed(&mut self, text: &str) {
        (**self).feed(text);
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        (**self).resize(cols, rows);
    }

    fn size(&self) -> Option<WindowSize> {
        (**self).size()
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScreen;

impl ScreenSink for NullScreen {
    fn feed(&mut self, _text: &str) {}
}

/// Accumulates all output in memory.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    text: String,
    size: Option<WindowSize>,
    resizes: Vec<WindowSize>,
}

impl Transcript {
    /// Create an empty transcript with no geometry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty transcript reporting the given geometry.
    #[must_use]
    pub const fn with_size(cols: u16, rows: u16) -> Self {
        Self {
            text: String::new(),
            size: Some(WindowSize::new(cols, rows)),
            resizes: Vec::new(),
        }
    }

    /// Everything fed so far.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every geometry change, in order.
    #[must_use]
    pub fn resizes(&self) -> &[WindowSize] {
        &self.resizes
    }
}

impl ScreenSink for Transcript {
    fn feed(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        let size = WindowSize::new(cols, rows);
        self.size = Some(size);
        self.resizes.push(size);
    }

    fn size(&self) -> Option<WindowSize> {
        self.size
    }
}

/// Writes output straight to an [`std::io::Write`], e.g. stdout.
#[derive(Debug)]
pub struct WriterScreen<W> {
    writer: W,
    size: Option<WindowSize>,
}

impl<W: Write + Send> WriterScreen<W> {
    /// Wrap a writer, optionally reporting a geometry.
    pub const fn new(writer: W, size: Option<WindowSize>) -> Self {
        Self { writer, size }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ScreenSink for WriterScreen<W> {
    fn feed(&mut self, text: &str) {
        let result = self
            .writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            tracing::debug!(error = %e, "screen write failed");
        }
    }

    fn resize(&mut self, cols: u16, rows: u16) {
        self.size = Some(WindowSize::new(cols, rows));
    }

    fn size(&self) -> Option<WindowSize> {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_accumulates() {
        let mut screen = Transcript::new();
        screen.feed("a");
        screen.feed("b");
        assert_eq!(screen.text(), "ab");
        assert_eq!(screen.size(), None);

        screen.resize(100, 30);
        assert_eq!(screen.size(), Some(WindowSize::new(100, 30)));
        assert_eq!(screen.resizes(), &[WindowSize::new(100, 30)]);
    }

    #[test]
    fn boxed_sink_forwards() {
        let mut screen: Box<dyn ScreenSink> = Box::new(Transcript::with_size(10, 5));
        screen.feed("x");
        assert_eq!(screen.size(), Some(WindowSize::new(10, 5)));
    }

    #[test]
    fn writer_screen_writes_text() {
        let mut screen = WriterScreen::new(Vec::new(), None);
        screen.feed("héllo");
        assert_eq!(screen.into_inner(), "héllo".as_bytes());
    }
}

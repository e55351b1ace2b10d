//! Bounded look-behind over earlier output.

/// Keeps at most `capacity` bytes of earlier output so a pattern split across
/// two reads can still match.
#[derive(Debug, Clone)]
pub(crate) struct Lookbehind {
    capacity: usize,
    text: String,
}

impl Lookbehind {
    pub(crate) const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            text: String::new(),
        }
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Trim history to the capacity, then append `chunk` in full.
    ///
    /// The returned text is the history tail followed by the whole chunk, so a
    /// match inside the current chunk is never lost to trimming.
    pub(crate) fn push(&mut self, chunk: &str) -> &str {
        self.trim();
        self.text.push_str(chunk);
        &self.text
    }

    /// Drop all history.
    pub(crate) fn clear(&mut self) {
        self.text.clear();
    }

    fn trim(&mut self) {
        if self.text.len() <= self.capacity {
            return;
        }
        let mut start = self.text.len() - self.capacity;
        while !self.text.is_char_boundary(start) {
            start += 1;
        }
        self.text.drain(..start);
    }
}

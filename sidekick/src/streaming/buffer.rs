//! Bounded accumulator for raw generated text.
//!
//! Keeps at most `cap` bytes, silently discarding the oldest text once the
//! cap is exceeded. A directive block that closes near the very end of a
//! long generation therefore stays extractable while memory stays bounded.

/// Sliding-tail text buffer.
#[derive(Debug)]
pub struct TailBuffer {
    buf: String,
    cap: usize,
}

impl TailBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: String::new(),
            cap,
        }
    }

    /// Append text, then truncate from the front down to the cap. Truncation
    /// rounds forward to a character boundary, so the retained tail is always
    /// valid UTF-8 and never exceeds the cap.
    pub fn push(&mut self, text: &str) {
        self.buf.push_str(text);
        if self.buf.len() > self.cap {
            let mut cut = self.buf.len() - self.cap;
            while !self.buf.is_char_boundary(cut) {
                cut += 1;
            }
            self.buf.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

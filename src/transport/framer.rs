//! Newline framing over a byte stream

/// Longest line kept before the partial buffer is treated as noise.
/// Telemetry lines are ~200 bytes; anything this long lost its terminator.
pub const MAX_LINE_LEN: usize = 4096;

/// Accumulates raw reads and yields complete lines.
///
/// Consumed bytes are skipped with an offset and compacted lazily instead of
/// draining the buffer on every line.
pub struct LineFramer {
    buffer: Vec<u8>,
    start: usize,
    max_line: usize,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(max_line.min(1024)),
            start: 0,
            max_line,
        }
    }

    /// Append bytes read from the link
    pub fn push(&mut self, data: &[u8]) {
        if self.start > 0 && self.start >= self.buffer.len() / 2 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
        self.buffer.extend_from_slice(data);
    }

    /// Pop the next complete, non-empty line (`\n` or `\r\n` terminated)
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let pending = &self.buffer[self.start..];
            let Some(pos) = pending.iter().position(|&b| b == b'\n') else {
                if pending.len() > self.max_line {
                    log::debug!("Discarding {} bytes without line terminator", pending.len());
                    self.clear();
                }
                return None;
            };

            let mut line = &pending[..pos];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = line.to_vec();
            self.start += pos + 1;

            if !line.is_empty() {
                return Some(line);
            }
        }
    }

    /// Bytes buffered but not yet returned
    pub fn pending(&self) -> usize {
        self.buffer.len() - self.start
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start = 0;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_across_reads() {
        let mut framer = LineFramer::new();
        framer.push(b"{\"arm_id\":");
        assert_eq!(framer.next_line(), None);

        framer.push(b"\"AA\"}\r\n{\"b\":1}\n");
        assert_eq!(framer.next_line().unwrap(), b"{\"arm_id\":\"AA\"}");
        assert_eq!(framer.next_line().unwrap(), b"{\"b\":1}");
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_skips_blank_lines() {
        let mut framer = LineFramer::new();
        framer.push(b"\n\r\n\nabc\n");
        assert_eq!(framer.next_line().unwrap(), b"abc");
        assert_eq!(framer.next_line(), None);
    }

    #[test]
    fn test_overlong_partial_is_discarded() {
        let mut framer = LineFramer::with_max_line(8);
        framer.push(b"0123456789abcdef");
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.pending(), 0);

        framer.push(b"ok\n");
        assert_eq!(framer.next_line().unwrap(), b"ok");
    }

    #[test]
    fn test_compaction_keeps_partial_tail() {
        let mut framer = LineFramer::new();
        framer.push(b"one\ntwo\nthr");
        assert_eq!(framer.next_line().unwrap(), b"one");
        assert_eq!(framer.next_line().unwrap(), b"two");
        framer.push(b"ee\n");
        assert_eq!(framer.next_line().unwrap(), b"three");
    }
}

//! Bounded capture buffer for sandbox stdout/stderr streams.

use super::MAX_OUTPUT_SIZE;

const TRUNCATION_MARKER: &str = "\n...[output truncated]";

/// Accumulates bytes up to `MAX_OUTPUT_SIZE`; writes past the cap are
/// silently discarded and a truncation marker is appended once.
pub struct BoundedBuffer {
    data: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl BoundedBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_OUTPUT_SIZE)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: Vec::new(),
            cap,
            truncated: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        if self.data.len() >= self.cap {
            self.truncated = true;
            return;
        }
        let remaining = self.cap - self.data.len();
        if chunk.len() > remaining {
            self.data.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        } else {
            self.data.extend_from_slice(chunk);
        }
    }

    /// Consumes the buffer into a lossily-decoded string, with the
    /// truncation marker appended if any bytes were discarded.
    pub fn into_string(self) -> String {
        let mut s = String::from_utf8_lossy(&self.data).into_owned();
        if self.truncated {
            s.push_str(TRUNCATION_MARKER);
        }
        s
    }
}

impl Default for BoundedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_cap_passthrough() {
        let mut buf = BoundedBuffer::with_capacity(16);
        buf.push(b"hello");
        assert_eq!(buf.into_string(), "hello");
    }

    #[test]
    fn test_over_cap_truncates() {
        let mut buf = BoundedBuffer::with_capacity(4);
        buf.push(b"hello world");
        let s = buf.into_string();
        assert!(s.starts_with("hell"));
        assert!(s.contains("truncated"));
    }

    #[test]
    fn test_never_exceeds_cap_plus_marker() {
        let mut buf = BoundedBuffer::with_capacity(8);
        for _ in 0..100 {
            buf.push(b"0123456789");
        }
        let s = buf.into_string();
        assert!(s.len() <= 8 + TRUNCATION_MARKER.len());
    }
}

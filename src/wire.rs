//! Host-endian field cursors for the fixed-layout header blocks.
//!
//! Every IQX header is a fixed 4096-byte block whose fields sit at fixed
//! offsets. The cursors here read and write those fields one by one instead
//! of reinterpreting raw bytes as struct layouts.

/// Sequential field writer over a fixed-size byte buffer.
pub struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        FieldWriter { buf, pos: 0 }
    }

    /// Current offset within the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    pub fn put_u16(&mut self, v: u16) {
        self.put(&v.to_ne_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.put(&v.to_ne_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.put(&v.to_ne_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.put(&v.to_ne_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.put(&v.to_ne_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.put(&v.to_ne_bytes());
    }

    pub fn put_bool(&mut self, v: bool) {
        self.put_u32(u32::from(v));
    }

    pub fn put_bytes(&mut self, v: &[u8]) {
        self.put(v);
    }

    /// Write `s` into a fixed `len`-byte slot, truncated if necessary and
    /// always NUL-terminated; the remainder of the slot stays zeroed.
    pub fn put_str(&mut self, s: &str, len: usize) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(len - 1);
        self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        for b in &mut self.buf[self.pos + n..self.pos + len] {
            *b = 0;
        }
        self.pos += len;
    }

    /// Skip `n` bytes, leaving them untouched.
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// Sequential field reader over a byte buffer.
pub struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        FieldReader { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    pub fn get_u16(&mut self) -> u16 {
        u16::from_ne_bytes(self.take())
    }

    pub fn get_u32(&mut self) -> u32 {
        u32::from_ne_bytes(self.take())
    }

    pub fn get_i32(&mut self) -> i32 {
        i32::from_ne_bytes(self.take())
    }

    pub fn get_u64(&mut self) -> u64 {
        u64::from_ne_bytes(self.take())
    }

    pub fn get_i64(&mut self) -> i64 {
        i64::from_ne_bytes(self.take())
    }

    pub fn get_f64(&mut self) -> f64 {
        f64::from_ne_bytes(self.take())
    }

    pub fn get_bool(&mut self) -> bool {
        self.get_u32() != 0
    }

    pub fn get_bytes<const N: usize>(&mut self) -> [u8; N] {
        self.take()
    }

    /// Read a fixed `len`-byte NUL-padded text slot as a String.
    /// Bytes after the first NUL are ignored; non-UTF-8 bytes are replaced.
    pub fn get_str(&mut self, len: usize) -> String {
        let slot = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        let end = slot.iter().position(|&b| b == 0).unwrap_or(len);
        String::from_utf8_lossy(&slot[..end]).into_owned()
    }

    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }
}

/// View a 16-bit sample slice as raw bytes in host order.
pub fn sample_bytes(samples: &[i16]) -> &[u8] {
    // SAFETY: i16 has no padding or invalid bit patterns, and the byte
    // length cannot overflow because the slice already fits in memory.
    unsafe { std::slice::from_raw_parts(samples.as_ptr().cast(), samples.len() * 2) }
}

/// Copy raw bytes into 16-bit samples in host order. The trailing byte of
/// an odd-length slice is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_round_trip() {
        let mut buf = [0u8; 64];
        let mut w = FieldWriter::new(&mut buf);
        w.put_u64(0xF7F6_7574_F3F2_7170);
        w.put_i32(-1);
        w.put_f64(98_304_000.0);
        w.put_bool(true);
        w.put_str("rf_a", 16);
        assert_eq!(w.position(), 8 + 4 + 8 + 4 + 16);

        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_u64(), 0xF7F6_7574_F3F2_7170);
        assert_eq!(r.get_i32(), -1);
        assert_eq!(r.get_f64(), 98_304_000.0);
        assert!(r.get_bool());
        assert_eq!(r.get_str(16), "rf_a");
    }

    #[test]
    fn test_sample_byte_views() {
        let samples = [1i16, -1, 256, -32768];
        let bytes = sample_bytes(&samples);
        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes_to_samples(bytes), samples);
    }

    #[test]
    fn test_str_truncation() {
        let mut buf = [0xFFu8; 8];
        let mut w = FieldWriter::new(&mut buf);
        w.put_str("longer-than-slot", 8);
        let mut r = FieldReader::new(&buf);
        assert_eq!(r.get_str(8), "longer-");
    }
}

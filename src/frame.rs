//! Frame preamble codec and frame-level I/O.
//!
//! Every record in an IQX file is a frame: a fixed 4096-byte preamble
//! followed by a header block, an optional data block and an optional tail.
//! The preamble starts with four sync words; a mismatch is fatal corruption.
//!
//! `framesize = PREAMBLE_SIZE + headsize + datasize (+ tail)` always holds;
//! alignment of the parts to the frame-size bounds is the caller's business.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use log::trace;

use crate::alloc::AlignedBuf;
use crate::error::{Error, Result};
use crate::time::Timespec;
use crate::types::{frame_type, FRAMESIZE_MAX, HEADSIZE_MIN, PREAMBLE_SIZE, STREAM_INDEPENDENT, SYNC};
use crate::wire::{FieldReader, FieldWriter};

/// Decoded frame preamble.
#[derive(Debug, Clone, Copy)]
pub struct Preamble {
    /// Size of the whole frame, preamble included.
    pub framesize: u64,
    /// Size of the frame header block.
    pub headsize: u64,
    /// Size of the frame data block.
    pub datasize: u64,
    /// Frame timestamp (relative recording time for payload frames).
    pub timestamp: Timespec,
    /// Raw frame-type tag.
    pub frametype: u32,
    /// Stream number, [`STREAM_INDEPENDENT`] for stream-independent frames.
    pub streamnum: i32,
    /// Size of the previous frame (carried but not populated by writers).
    pub previousframesize: u64,
}

impl Preamble {
    /// New preamble for a stream-independent frame of the given type.
    /// Sizes start at zero; the caller fills them before writing.
    pub fn new(frametype: u32) -> Self {
        Preamble {
            framesize: 0,
            headsize: 0,
            datasize: 0,
            timestamp: Timespec::default(),
            frametype,
            streamnum: STREAM_INDEPENDENT,
            previousframesize: 0,
        }
    }

    /// Size of the tail block implied by the size fields.
    pub fn tail_size(&self) -> u64 {
        self.framesize
            .saturating_sub(PREAMBLE_SIZE + self.headsize + self.datasize)
    }

    /// Encode into a zeroed preamble-sized buffer.
    pub fn encode(&self) -> AlignedBuf {
        let mut buf = AlignedBuf::frame_aligned(PREAMBLE_SIZE as usize);
        let mut w = FieldWriter::new(&mut buf);
        for sync in SYNC {
            w.put_u64(sync);
        }
        w.put_u64(self.framesize);
        w.put_u64(self.headsize);
        w.put_u64(self.datasize);
        w.put_i64(self.timestamp.sec);
        w.put_i64(self.timestamp.nsec);
        w.put_u32(self.frametype);
        w.put_i32(self.streamnum);
        w.put_u64(self.previousframesize);
        buf
    }

    /// Decode from a preamble-sized buffer, verifying the sync words.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(buf);
        for expected in SYNC {
            if r.get_u64() != expected {
                return Err(Error::invalid_format("wrong frame magic number"));
            }
        }
        let framesize = r.get_u64();
        let headsize = r.get_u64();
        let datasize = r.get_u64();
        let timestamp = Timespec::new(r.get_i64(), r.get_i64());
        let frametype = r.get_u32();
        let streamnum = r.get_i32();
        let previousframesize = r.get_u64();
        if framesize > FRAMESIZE_MAX {
            return Err(Error::FrameTooLarge { size: framesize });
        }
        // every header block is at least HEADSIZE_MIN; the fixed-layout
        // decoders rely on it
        if headsize < HEADSIZE_MIN {
            return Err(Error::invalid_format("frame header smaller than minimum"));
        }
        if framesize < PREAMBLE_SIZE + headsize + datasize {
            return Err(Error::invalid_format("frame smaller than its parts"));
        }
        Ok(Preamble {
            framesize,
            headsize,
            datasize,
            timestamp,
            frametype,
            streamnum,
            previousframesize,
        })
    }
}

/// A decoded frame exclusively owning its aligned header/data/tail buffers.
#[derive(Debug)]
pub struct Frame {
    /// Header block bytes.
    pub header: AlignedBuf,
    /// Data block bytes.
    pub data: AlignedBuf,
    /// Tail block bytes (reserved, normally empty).
    pub tail: AlignedBuf,
}

impl Frame {
    fn empty() -> Self {
        Frame {
            header: AlignedBuf::empty(),
            data: AlignedBuf::empty(),
            tail: AlignedBuf::empty(),
        }
    }
}

/// Fail with a wrong-frame-type error unless the preamble carries `expected`.
pub fn assert_frame_type(expected: u32, preamble: &Preamble) -> Result<()> {
    if preamble.frametype != expected {
        return Err(Error::WrongFrameType {
            expected,
            found: preamble.frametype,
        });
    }
    Ok(())
}

/// Read exactly `buf.len()` bytes; a short read is a fatal format error.
pub fn read_exact_or(file: &mut File, buf: &mut [u8], what: &'static str) -> Result<()> {
    file.read_exact(buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::incomplete(what),
        _ => Error::Io(e),
    })
}

/// Read and decode the preamble at the current cursor position.
pub fn read_preamble(file: &mut File) -> Result<Preamble> {
    let mut buf = AlignedBuf::frame_aligned(PREAMBLE_SIZE as usize);
    read_exact_or(file, &mut buf, "preamble")?;
    Preamble::decode(&buf)
}

fn read_block(file: &mut File, bytes: u64, what: &'static str) -> Result<AlignedBuf> {
    if bytes > FRAMESIZE_MAX {
        return Err(Error::FrameTooLarge { size: bytes });
    }
    if bytes == 0 {
        return Ok(AlignedBuf::empty());
    }
    let mut buf = AlignedBuf::frame_aligned(bytes as usize);
    read_exact_or(file, &mut buf, what)?;
    Ok(buf)
}

/// Read one frame at the current cursor position.
///
/// Cue, trigger and overrun frames carry table arrays that their dedicated
/// readers consume directly from the file, so for those types only the
/// preamble is read and the returned frame is empty.
pub fn read_frame(file: &mut File) -> Result<(Preamble, Frame)> {
    let preamble = read_preamble(file)?;
    trace!(
        "frame type {} stream {} framesize {}",
        preamble.frametype,
        preamble.streamnum,
        preamble.framesize
    );
    if matches!(
        preamble.frametype,
        frame_type::TRIGGER | frame_type::CUE | frame_type::OVERRUN
    ) {
        return Ok((preamble, Frame::empty()));
    }
    let header = read_block(file, preamble.headsize, "frame")?;
    let data = read_block(file, preamble.datasize, "frame")?;
    let tail = read_block(file, preamble.tail_size(), "frame")?;
    Ok((preamble, Frame { header, data, tail }))
}

/// Write one frame at the current cursor position.
///
/// `framesize` is computed here as preamble + header + data (no tail).
/// Passing `None` for the header or data block seeks forward over its
/// declared size instead of writing, reserving the space to be filled later.
pub fn write_frame(
    file: &mut File,
    preamble: &mut Preamble,
    header: Option<&[u8]>,
    data: Option<&[u8]>,
) -> Result<()> {
    preamble.framesize = PREAMBLE_SIZE + preamble.headsize + preamble.datasize;

    file.write_all(&preamble.encode())?;

    match header {
        Some(bytes) => {
            debug_assert_eq!(bytes.len() as u64, preamble.headsize);
            file.write_all(bytes)?;
        }
        None => {
            file.seek(SeekFrom::Current(preamble.headsize as i64))?;
        }
    }
    match data {
        Some(bytes) => {
            debug_assert_eq!(bytes.len() as u64, preamble.datasize);
            file.write_all(bytes)?;
        }
        None => {
            file.seek(SeekFrom::Current(preamble.datasize as i64))?;
        }
    }
    Ok(())
}

/// Write a marker frame: stream-independent, a zeroed minimum-size header
/// and no data. Used for payload-start, payload-end and EOF.
pub fn write_marker_frame(file: &mut File, frametype: u32) -> Result<()> {
    let mut preamble = Preamble::new(frametype);
    preamble.headsize = HEADSIZE_MIN;
    let header = AlignedBuf::frame_aligned(HEADSIZE_MIN as usize);
    write_frame(file, &mut preamble, Some(&header), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_round_trip() {
        let mut p = Preamble::new(frame_type::IQDATA);
        p.framesize = PREAMBLE_SIZE + 4096 + 8192;
        p.headsize = 4096;
        p.datasize = 8192;
        p.timestamp = Timespec::new(3, 250_000_000);
        p.streamnum = 1;

        let buf = p.encode();
        let back = Preamble::decode(&buf).unwrap();
        assert_eq!(back.framesize, p.framesize);
        assert_eq!(back.headsize, 4096);
        assert_eq!(back.datasize, 8192);
        assert_eq!(back.timestamp, p.timestamp);
        assert_eq!(back.frametype, frame_type::IQDATA);
        assert_eq!(back.streamnum, 1);
        assert_eq!(back.tail_size(), 0);
    }

    #[test]
    fn test_bad_sync_rejected() {
        let p = Preamble::new(frame_type::EOF);
        let mut buf = p.encode();
        buf.as_mut_slice()[0] ^= 0xFF;
        let err = Preamble::decode(&buf).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
    }

    #[test]
    fn test_undersized_header_rejected() {
        let mut p = Preamble::new(frame_type::FILEDESC);
        p.framesize = PREAMBLE_SIZE;
        p.headsize = 0;
        let buf = p.encode();
        let err = Preamble::decode(&buf).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { .. }));
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut p = Preamble::new(frame_type::EOF);
        p.framesize = FRAMESIZE_MAX + 1;
        let buf = p.encode();
        assert!(matches!(
            Preamble::decode(&buf),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_assert_frame_type() {
        let p = Preamble::new(frame_type::FILEDESC);
        assert!(assert_frame_type(frame_type::FILEDESC, &p).is_ok());
        assert!(matches!(
            assert_frame_type(frame_type::STREAMDESC, &p),
            Err(Error::WrongFrameType {
                expected: 3,
                found: 2
            })
        ));
    }
}

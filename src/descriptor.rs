//! File and stream descriptor codecs.
//!
//! The file descriptor is written once at the start of a recording with
//! placeholder offsets and duration, and is the only record ever patched in
//! place (at close, with the final values and the completeness flag).
//! Stream descriptors are write-once.

use crate::alloc::AlignedBuf;
use crate::error::Result;
use crate::time::Timespec;
use crate::types::{
    ExportPermission, DATA_ALIGNMENT, FRAMESIZE_MAX, FRAMESIZE_MIN, IQX_MINREADVERSION,
    IQX_VERSION, MAX_FILENAME_LEN, MAX_SOURCENAME_LEN, NO_NEXT_CHUNK,
};
use crate::wire::{FieldReader, FieldWriter};

/// The per-file descriptor record.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Format version the file was written with.
    pub version: u32,
    /// Minimum reader version able to understand the file.
    pub min_read_version: u32,
    /// Recording UUID, identical for all chunks of one recording.
    pub uuid: [u8; 16],
    /// Recording start time, seconds since the epoch.
    pub start_time: Timespec,
    /// Timezone offset from UTC in seconds at recording time.
    pub tz_offset: i32,
    /// Whether daylight saving time was in effect (0 unknown).
    pub daylight: i32,
    /// This file is chunk number x of the recording.
    pub chunknum: u32,
    /// Chunk number of the next file, [`NO_NEXT_CHUNK`] if none.
    pub chunknext: i32,
    /// Total number of streams in the recording.
    pub nstreams: u32,
    /// Minimum frame size used in this recording.
    pub framesize_min: u64,
    /// Maximum frame size used in this recording.
    pub framesize_max: u64,
    /// Byte offset of the first payload frame (0 until patched at close).
    pub payload_offset: i64,
    /// Byte offset of the first epilogue frame (0 until patched at close).
    pub epilogue_offset: i64,
    /// User-visible recording name.
    pub name: String,
    /// Recording duration of this chunk.
    pub duration: Timespec,
    /// True once the chunk was finalized without errors.
    pub complete: bool,
}

impl FileDescriptor {
    /// A fresh descriptor with placeholder offsets/duration, as written at
    /// the start of a recording.
    pub fn placeholder(name: &str, nstreams: u32, uuid: [u8; 16]) -> Self {
        FileDescriptor {
            version: IQX_VERSION,
            min_read_version: IQX_MINREADVERSION,
            uuid,
            start_time: Timespec::default(),
            tz_offset: 0,
            daylight: 0,
            chunknum: 0,
            chunknext: NO_NEXT_CHUNK,
            nstreams,
            framesize_min: FRAMESIZE_MIN,
            framesize_max: FRAMESIZE_MAX,
            payload_offset: 0,
            epilogue_offset: 0,
            name: name.to_owned(),
            duration: Timespec::default(),
            complete: false,
        }
    }

    /// Encode into a 4096-byte header block.
    pub fn encode(&self) -> AlignedBuf {
        let mut buf = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
        let mut w = FieldWriter::new(&mut buf);
        w.put_u32(self.version);
        w.put_u32(self.min_read_version);
        w.put_bytes(&self.uuid);
        w.put_i64(self.start_time.sec);
        w.put_i64(self.start_time.nsec);
        w.put_i32(self.tz_offset);
        w.put_i32(self.daylight);
        w.put_u32(self.chunknum);
        w.put_i32(self.chunknext);
        w.put_u32(self.nstreams);
        w.put_u64(self.framesize_min);
        w.put_u64(self.framesize_max);
        w.put_i64(self.payload_offset);
        w.put_i64(self.epilogue_offset);
        w.put_str(&self.name, MAX_FILENAME_LEN);
        w.put_i64(self.duration.sec);
        w.put_i64(self.duration.nsec);
        w.put_bool(self.complete);
        buf
    }

    /// Decode from a 4096-byte header block.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(buf);
        let version = r.get_u32();
        let min_read_version = r.get_u32();
        let uuid = r.get_bytes::<16>();
        let start_time = Timespec::new(r.get_i64(), r.get_i64());
        let tz_offset = r.get_i32();
        let daylight = r.get_i32();
        let chunknum = r.get_u32();
        let chunknext = r.get_i32();
        let nstreams = r.get_u32();
        let framesize_min = r.get_u64();
        let framesize_max = r.get_u64();
        let payload_offset = r.get_i64();
        let epilogue_offset = r.get_i64();
        let name = r.get_str(MAX_FILENAME_LEN);
        let duration = Timespec::new(r.get_i64(), r.get_i64());
        let complete = r.get_bool();
        Ok(FileDescriptor {
            version,
            min_read_version,
            uuid,
            start_time,
            tz_offset,
            daylight,
            chunknum,
            chunknext,
            nstreams,
            framesize_min,
            framesize_max,
            payload_offset,
            epilogue_offset,
            name,
            duration,
            complete,
        })
    }

    /// UUID formatted in the canonical hyphenated form.
    pub fn uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.uuid).to_string()
    }
}

/// The per-stream descriptor record.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    /// Raw stream-type tag.
    pub stream_type: u32,
    /// Minimum frame size this stream uses.
    pub framesize_min: u64,
    /// Maximum frame size this stream uses.
    pub framesize_max: u64,
    /// Data rate in bytes per second.
    pub datarate: f64,
    /// Frame (interrupt) rate in frames per second.
    pub framerate: f64,
    /// Name of the recording source.
    pub source: String,
}

impl StreamDescriptor {
    /// Encode into a 4096-byte header block.
    pub fn encode(&self) -> AlignedBuf {
        let mut buf = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
        let mut w = FieldWriter::new(&mut buf);
        w.put_u32(self.stream_type);
        w.put_u64(self.framesize_min);
        w.put_u64(self.framesize_max);
        w.put_f64(self.datarate);
        w.put_f64(self.framerate);
        w.put_str(&self.source, MAX_SOURCENAME_LEN);
        buf
    }

    /// Decode from a 4096-byte header block.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(buf);
        Ok(StreamDescriptor {
            stream_type: r.get_u32(),
            framesize_min: r.get_u64(),
            framesize_max: r.get_u64(),
            datarate: r.get_f64(),
            framerate: r.get_f64(),
            source: r.get_str(MAX_SOURCENAME_LEN),
        })
    }
}

/// Measurement parameters of an I/Q stream, each with a validity flag.
///
/// This is the data block of an I/Q stream-descriptor frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IqStreamParameters {
    /// Reference level in dBm.
    pub reflevel: f64,
    /// Whether the reference level field is valid.
    pub reflevel_valid: bool,
    /// Whether the reference level varied over the recording.
    pub reflevel_variable: bool,
    /// Sample rate in complex samples per second.
    pub samplerate: f64,
    /// Whether the sample rate field is valid.
    pub samplerate_valid: bool,
    /// Variable sample rates are carried but not supported.
    pub samplerate_variable: bool,
    /// Analysis bandwidth in Hz.
    pub bandwidth: f64,
    /// Whether the bandwidth field is valid.
    pub bandwidth_valid: bool,
    /// Whether the bandwidth varied over the recording.
    pub bandwidth_variable: bool,
    /// Center frequency in Hz.
    pub center_frequency: f64,
    /// Whether the center frequency field is valid.
    pub center_frequency_valid: bool,
    /// Bits per sample component, 12 or 16.
    pub resolution: u32,
    /// Whether the resolution field is valid.
    pub resolution_valid: bool,
    /// Whether samples may be exported from the recording.
    pub export_permission: ExportPermission,
    /// Whether the export permission field is valid.
    pub export_permission_valid: bool,
}

impl IqStreamParameters {
    /// On-disk size of the parameter block.
    pub const SIZE: usize = DATA_ALIGNMENT as usize;

    /// Encode into a 4096-byte data block.
    pub fn encode(&self) -> AlignedBuf {
        let mut buf = AlignedBuf::frame_aligned(Self::SIZE);
        let mut w = FieldWriter::new(&mut buf);
        w.put_f64(self.reflevel);
        w.put_bool(self.reflevel_valid);
        w.put_bool(self.reflevel_variable);
        w.put_f64(self.samplerate);
        w.put_bool(self.samplerate_valid);
        w.put_bool(self.samplerate_variable);
        w.put_f64(self.bandwidth);
        w.put_bool(self.bandwidth_valid);
        w.put_bool(self.bandwidth_variable);
        w.put_f64(self.center_frequency);
        w.put_bool(self.center_frequency_valid);
        w.put_u32(self.resolution);
        w.put_bool(self.resolution_valid);
        w.put_u32(self.export_permission.as_raw());
        w.put_bool(self.export_permission_valid);
        buf
    }

    /// Decode from a 4096-byte data block.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let mut r = FieldReader::new(buf);
        Ok(IqStreamParameters {
            reflevel: r.get_f64(),
            reflevel_valid: r.get_bool(),
            reflevel_variable: r.get_bool(),
            samplerate: r.get_f64(),
            samplerate_valid: r.get_bool(),
            samplerate_variable: r.get_bool(),
            bandwidth: r.get_f64(),
            bandwidth_valid: r.get_bool(),
            bandwidth_variable: r.get_bool(),
            center_frequency: r.get_f64(),
            center_frequency_valid: r.get_bool(),
            resolution: r.get_u32(),
            resolution_valid: r.get_bool(),
            export_permission: ExportPermission::from_raw(r.get_u32()),
            export_permission_valid: r.get_bool(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_descriptor_round_trip() {
        let mut desc = FileDescriptor::placeholder("capture", 2, *b"0123456789abcdef");
        desc.start_time = Timespec::new(1_472_479_452, 125_000);
        desc.tz_offset = 3600;
        desc.payload_offset = 16384;
        desc.epilogue_offset = 1 << 20;
        desc.duration = Timespec::new(12, 500_000_000);
        desc.complete = true;

        let buf = desc.encode();
        assert_eq!(buf.len(), 4096);
        let back = FileDescriptor::decode(&buf).unwrap();
        assert_eq!(back.version, IQX_VERSION);
        assert_eq!(back.uuid, desc.uuid);
        assert_eq!(back.start_time, desc.start_time);
        assert_eq!(back.tz_offset, 3600);
        assert_eq!(back.nstreams, 2);
        assert_eq!(back.payload_offset, 16384);
        assert_eq!(back.epilogue_offset, 1 << 20);
        assert_eq!(back.name, "capture");
        assert_eq!(back.duration, desc.duration);
        assert!(back.complete);
    }

    #[test]
    fn test_stream_descriptor_round_trip() {
        let desc = StreamDescriptor {
            stream_type: crate::types::StreamType::Iq16.as_raw(),
            framesize_min: 8192,
            framesize_max: 1 << 20,
            datarate: 400_000.0,
            framerate: 10.0,
            source: "rf_a".to_owned(),
        };
        let back = StreamDescriptor::decode(&desc.encode()).unwrap();
        assert_eq!(back.stream_type, desc.stream_type);
        assert_eq!(back.datarate, 400_000.0);
        assert_eq!(back.source, "rf_a");
    }

    #[test]
    fn test_iq_parameters_round_trip() {
        let params = IqStreamParameters {
            reflevel: -10.0,
            reflevel_valid: true,
            samplerate: 100_000.0,
            samplerate_valid: true,
            bandwidth: 80_000.0,
            bandwidth_valid: true,
            center_frequency: 98.0e6,
            center_frequency_valid: true,
            resolution: 16,
            resolution_valid: true,
            export_permission: ExportPermission::Allowed,
            export_permission_valid: true,
            ..Default::default()
        };
        let buf = params.encode();
        assert_eq!(buf.len(), IqStreamParameters::SIZE);
        let back = IqStreamParameters::decode(&buf).unwrap();
        assert_eq!(back, params);
    }
}

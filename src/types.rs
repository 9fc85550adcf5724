//! IQX format constants and record types.
//!
//! All values are fixed by the on-disk format and must never change.
//! Multi-byte fields are host-endian; the format is not portable across
//! endianness.

use std::fmt;

use crate::time::Timespec;

/// IQX file format version written by this crate.
pub const IQX_VERSION: u32 = 0x0013;
/// Minimum reader version able to understand files written by this crate.
pub const IQX_MINREADVERSION: u32 = 0x0010;

/// Alignment unit for frames and their header/data blocks.
pub const DATA_ALIGNMENT: u64 = 4096;
/// On-disk size of a trigger or overrun table entry.
pub const TRIGGER_ENTRY_SIZE: u64 = 64;
/// On-disk size of a cue table entry.
pub const CUE_ENTRY_SIZE: u64 = 32;

/// Fixed size of the frame preamble.
pub const PREAMBLE_SIZE: u64 = 4096;
/// No frame header is smaller than this.
pub const HEADSIZE_MIN: u64 = 4096;
/// No frame is smaller than this.
pub const FRAMESIZE_MIN: u64 = 8192;
/// No frame is larger than this.
pub const FRAMESIZE_MAX: u64 = 0x2000_0000;

/// The four preamble sync words, in file order.
pub const SYNC: [u64; 4] = [
    0xF7F6_7574_F3F2_7170,
    0x7776_F5F4_7372_F1F0,
    0x8778_F99F_8118_F22F,
    0x7887_6FF6_7557_6EE6,
];

/// Max length of the user-visible file name slot.
pub const MAX_FILENAME_LEN: usize = 128;
/// Max length of a stream source name slot.
pub const MAX_SOURCENAME_LEN: usize = 128;
/// Max length of the user text (comment) slot.
pub const MAX_USERTEXT_LEN: usize = 4092;
/// Max length of a tag slot.
pub const MAX_TAG_LEN: usize = 128;
/// Max length of a bookmark name slot.
pub const MAX_BOOKMARK_LEN: usize = 128;

/// Stream number for stream-independent frames.
pub const STREAM_INDEPENDENT: i32 = -1;
/// Sequence number for frames where it does not apply.
pub const SEQUENCENUM_INVALID: i64 = -1;
/// Next-chunk number when there is no next chunk.
pub const NO_NEXT_CHUNK: i32 = -1;

/// Upper bound on cue table entries; inserting past it is silently ignored.
pub const MAX_CUE_ENTRIES: u64 =
    (FRAMESIZE_MAX - DATA_ALIGNMENT - PREAMBLE_SIZE) / CUE_ENTRY_SIZE;
/// Upper bound on trigger table entries.
pub const MAX_TRIGGER_ENTRIES: u64 =
    (FRAMESIZE_MAX - DATA_ALIGNMENT - PREAMBLE_SIZE) / TRIGGER_ENTRY_SIZE;
/// Upper bound on overrun table entries.
pub const MAX_OVERRUN_ENTRIES: u64 = MAX_TRIGGER_ENTRIES;

/// Raw frame-type tags as stored in the preamble.
pub mod frame_type {
    /// Uninitialized frame.
    pub const UNDEFINED: u32 = 0;
    /// Frame of unknown type.
    pub const UNKNOWN: u32 = 1;
    /// File descriptor frame (first frame of every file).
    pub const FILEDESC: u32 = 2;
    /// Stream descriptor frame.
    pub const STREAMDESC: u32 = 3;
    /// Payload-start marker.
    pub const PAYLOADSTART: u32 = 4;
    /// Payload-end marker.
    pub const PAYLOADEND: u32 = 5;
    /// Tag record.
    pub const TAG: u32 = 6;
    /// Bookmark record.
    pub const BOOKMARK: u32 = 7;
    /// Cue table frame.
    pub const CUE: u32 = 8;
    /// User text (comment) record.
    pub const USERTEXT: u32 = 9;
    /// End-of-file sentinel.
    pub const EOF: u32 = 10;
    /// Trigger table frame.
    pub const TRIGGER: u32 = 11;
    /// Overrun table frame.
    pub const OVERRUN: u32 = 12;
    /// Generic data frame.
    pub const DATA: u32 = 65536;
    /// Data frame of unknown content.
    pub const UNKNOWNDATA: u32 = 65537;
    /// I/Q sample data frame.
    pub const IQDATA: u32 = 65538;
    /// Geolocation (GPS fix) frame.
    pub const GEOLOC: u32 = 65792;
}

/// Type of a stream, as stored in its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// I/Q samples, 16 bits per component.
    Iq16,
    /// I/Q samples, 12 bits per component, DIGIQ-packed.
    Iq12,
    /// Geolocation (GPS fix) metadata.
    Geolocation,
    /// Anything this reader does not understand.
    Other(u32),
}

impl StreamType {
    /// Raw tag for 16-bit I/Q streams (same value as the IQ data frame type).
    pub const RAW_IQ16: u32 = frame_type::IQDATA;
    /// Raw tag for 12-bit I/Q streams.
    pub const RAW_IQ12: u32 = frame_type::IQDATA + 2;

    /// Create a StreamType from its raw descriptor value.
    pub fn from_raw(value: u32) -> Self {
        match value {
            Self::RAW_IQ16 => StreamType::Iq16,
            Self::RAW_IQ12 => StreamType::Iq12,
            frame_type::GEOLOC => StreamType::Geolocation,
            other => StreamType::Other(other),
        }
    }

    /// Get the raw descriptor value.
    pub fn as_raw(&self) -> u32 {
        match self {
            StreamType::Iq16 => Self::RAW_IQ16,
            StreamType::Iq12 => Self::RAW_IQ12,
            StreamType::Geolocation => frame_type::GEOLOC,
            StreamType::Other(raw) => *raw,
        }
    }

    /// True for both I/Q resolutions.
    pub const fn is_iq(&self) -> bool {
        matches!(self, StreamType::Iq16 | StreamType::Iq12)
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Iq16 => write!(f, "iq16"),
            StreamType::Iq12 => write!(f, "iq12"),
            StreamType::Geolocation => write!(f, "geolocation"),
            StreamType::Other(raw) => write!(f, "other({raw})"),
        }
    }
}

/// Whether samples of a stream may be exported from the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum ExportPermission {
    /// The field was never initialized.
    #[default]
    Undefined = 0,
    /// The permission could not be determined.
    Unknown = 1,
    /// Export is not allowed.
    Prohibited = 2,
    /// Export is allowed.
    Allowed = 3,
}

impl ExportPermission {
    /// Create an ExportPermission from its raw descriptor value.
    pub fn from_raw(value: u32) -> Self {
        match value {
            2 => ExportPermission::Prohibited,
            3 => ExportPermission::Allowed,
            1 => ExportPermission::Unknown,
            _ => ExportPermission::Undefined,
        }
    }

    /// Get the raw descriptor value.
    pub const fn as_raw(&self) -> u32 {
        *self as u32
    }
}

/// Cue table entry: maps a recording timestamp to the byte offset of the
/// payload frame starting at that time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CueEntry {
    /// Recording time, relative to the start of the recording.
    pub timestamp: Timespec,
    /// Byte offset of the frame, from the start of the file.
    pub offset: i64,
    /// Stream the frame belongs to ([`STREAM_INDEPENDENT`] if unknown).
    pub streamnum: i32,
}

/// Trigger table entry: marks a trigger event at a recording timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TriggerEntry {
    /// Recording time, relative to the start of the recording.
    pub timestamp: Timespec,
    /// Timestamp as indicated on the capture hardware (0 if not applicable).
    pub hw_timestamp: u64,
    /// Sub-sample position of the event within the sample at `hw_timestamp`.
    pub intersample_offset: u16,
    /// Trigger source type.
    pub trigger_type: i64,
    /// Stream the event belongs to ([`STREAM_INDEPENDENT`] if unknown).
    pub streamnum: i32,
}

/// Overrun table entry: marks a capture overrun. Same layout as a trigger
/// entry; the presence of any overrun frame sets the file's overrun flag.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverrunEntry {
    /// Recording time, relative to the start of the recording.
    pub timestamp: Timespec,
    /// Timestamp as indicated on the capture hardware (0 if not applicable).
    pub hw_timestamp: u64,
    /// Sub-sample position within the sample at `hw_timestamp`.
    pub intersample_offset: u16,
    /// Overrun source type.
    pub overrun_type: i64,
    /// Stream the overrun belongs to ([`STREAM_INDEPENDENT`] if unknown).
    pub streamnum: i32,
}

/// A GPS fix carried by a geolocation payload frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geolocation {
    /// Time of the fix.
    pub timestamp: Timespec,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Course made good relative to true north.
    pub track: f64,
    /// Speed over ground in meters per second.
    pub speed: f64,
    /// Vertical speed in meters per second.
    pub climb: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_type_round_trip() {
        for ty in [StreamType::Iq16, StreamType::Iq12, StreamType::Geolocation] {
            assert_eq!(StreamType::from_raw(ty.as_raw()), ty);
        }
        assert_eq!(StreamType::from_raw(7), StreamType::Other(7));
    }

    #[test]
    fn test_stream_type_is_iq() {
        assert!(StreamType::Iq16.is_iq());
        assert!(StreamType::Iq12.is_iq());
        assert!(!StreamType::Geolocation.is_iq());
    }

    #[test]
    fn test_export_permission_raw() {
        assert_eq!(ExportPermission::from_raw(3), ExportPermission::Allowed);
        assert_eq!(ExportPermission::from_raw(2), ExportPermission::Prohibited);
        assert_eq!(ExportPermission::from_raw(99), ExportPermission::Undefined);
        assert_eq!(ExportPermission::Allowed.as_raw(), 3);
    }

    #[test]
    fn test_table_bounds() {
        // One maximum-size frame must hold exactly this many entries.
        assert_eq!(MAX_CUE_ENTRIES, (0x2000_0000 - 8192) / 32);
        assert_eq!(MAX_TRIGGER_ENTRIES, (0x2000_0000 - 8192) / 64);
    }
}

//! Epilogue record codecs: tags, user text, bookmarks and the
//! cue/trigger/overrun tables.
//!
//! Epilogue frames live between the payload-end frame and the EOF frame.
//! Tag, user-text and bookmark records carry a validity flag so an editor
//! can invalidate them in place without rewriting the file. Table frames
//! carry their entries in the data block, zero-padded to the alignment unit.

use std::fs::File;

use crate::alloc::AlignedBuf;
use crate::error::Result;
use crate::frame::{write_frame, Preamble};
use crate::time::Timespec;
use crate::types::{
    frame_type, CueEntry, OverrunEntry, TriggerEntry, CUE_ENTRY_SIZE, DATA_ALIGNMENT,
    HEADSIZE_MIN, MAX_BOOKMARK_LEN, MAX_TAG_LEN, MAX_USERTEXT_LEN, TRIGGER_ENTRY_SIZE,
};
use crate::wire::{FieldReader, FieldWriter};

/// A named bookmark at a recording timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    /// Bookmark name.
    pub name: String,
    /// Recording time the bookmark points at.
    pub timestamp: Timespec,
}

/// Byte offsets of the editable epilogue records, collected while scanning
/// a file opened for editing. All offsets point at the frame preamble.
#[derive(Debug, Default)]
pub struct MetaOffsets {
    /// Every tag frame in file order, valid or invalidated.
    pub tag_frames: Vec<u64>,
    /// The user-text frame, if one was written.
    pub usertext_frame: Option<u64>,
    /// The EOF frame; growth edits overwrite it and append a new one.
    pub eof_frame: Option<u64>,
}

/// Encode a tag header block. `valid == false` writes an invalidated slot.
pub fn encode_tag(tag: &str, valid: bool) -> AlignedBuf {
    let mut buf = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
    let mut w = FieldWriter::new(&mut buf);
    w.put_str(tag, MAX_TAG_LEN);
    w.put_bool(valid);
    buf
}

/// Decode a tag header block into its text and validity flag.
pub fn decode_tag(buf: &[u8]) -> (String, bool) {
    let mut r = FieldReader::new(buf);
    let tag = r.get_str(MAX_TAG_LEN);
    let valid = r.get_bool();
    (tag, valid)
}

/// Encode a user-text (comment) header block.
pub fn encode_usertext(text: &str, valid: bool) -> AlignedBuf {
    let mut buf = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
    let mut w = FieldWriter::new(&mut buf);
    w.put_str(text, MAX_USERTEXT_LEN);
    w.put_bool(valid);
    buf
}

/// Decode a user-text header block into its text and validity flag.
pub fn decode_usertext(buf: &[u8]) -> (String, bool) {
    let mut r = FieldReader::new(buf);
    let text = r.get_str(MAX_USERTEXT_LEN);
    let valid = r.get_bool();
    (text, valid)
}

/// Encode a bookmark header block.
pub fn encode_bookmark(bookmark: &Bookmark, valid: bool) -> AlignedBuf {
    let mut buf = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
    let mut w = FieldWriter::new(&mut buf);
    w.put_str(&bookmark.name, MAX_BOOKMARK_LEN);
    w.put_bool(valid);
    w.put_i64(bookmark.timestamp.sec);
    w.put_i64(bookmark.timestamp.nsec);
    buf
}

/// Decode a bookmark header block into the bookmark and its validity flag.
pub fn decode_bookmark(buf: &[u8]) -> (Bookmark, bool) {
    let mut r = FieldReader::new(buf);
    let name = r.get_str(MAX_BOOKMARK_LEN);
    let valid = r.get_bool();
    let timestamp = Timespec::new(r.get_i64(), r.get_i64());
    (Bookmark { name, timestamp }, valid)
}

/// Encode a cue/trigger/overrun table frame header (the entry count).
pub fn encode_table_header(numentries: u64) -> AlignedBuf {
    let mut buf = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
    FieldWriter::new(&mut buf).put_u64(numentries);
    buf
}

/// Decode the entry count from a table frame header.
pub fn decode_table_header(buf: &[u8]) -> u64 {
    FieldReader::new(buf).get_u64()
}

/// Data-block size for a table of `count` entries of `entry_size` bytes,
/// rounded up to the alignment unit. The padding holds zeroed entries that
/// readers skip via the header count.
pub fn table_data_size(count: u64, entry_size: u64) -> u64 {
    let bytes = count * entry_size;
    bytes.div_ceil(DATA_ALIGNMENT) * DATA_ALIGNMENT
}

fn put_cue_entry(w: &mut FieldWriter<'_>, entry: &CueEntry) {
    w.put_i64(entry.timestamp.sec);
    w.put_i64(entry.timestamp.nsec);
    w.put_i64(entry.offset);
    w.put_i32(entry.streamnum);
    w.skip(4);
}

fn get_cue_entry(r: &mut FieldReader<'_>) -> CueEntry {
    let entry = CueEntry {
        timestamp: Timespec::new(r.get_i64(), r.get_i64()),
        offset: r.get_i64(),
        streamnum: r.get_i32(),
    };
    r.skip(4);
    entry
}

fn put_trigger_entry(w: &mut FieldWriter<'_>, entry: &TriggerEntry) {
    w.put_i64(entry.timestamp.sec);
    w.put_i64(entry.timestamp.nsec);
    w.put_u64(entry.hw_timestamp);
    w.put_u16(entry.intersample_offset);
    w.put_i64(entry.trigger_type);
    w.put_i32(entry.streamnum);
    w.skip(26);
}

fn get_trigger_entry(r: &mut FieldReader<'_>) -> TriggerEntry {
    let entry = TriggerEntry {
        timestamp: Timespec::new(r.get_i64(), r.get_i64()),
        hw_timestamp: r.get_u64(),
        intersample_offset: r.get_u16(),
        trigger_type: r.get_i64(),
        streamnum: r.get_i32(),
    };
    r.skip(26);
    entry
}

/// Encode a cue table into an alignment-padded data block.
pub fn encode_cue_table(entries: &[CueEntry]) -> AlignedBuf {
    let size = table_data_size(entries.len() as u64, CUE_ENTRY_SIZE);
    let mut buf = AlignedBuf::frame_aligned(size as usize);
    let mut w = FieldWriter::new(&mut buf);
    for entry in entries {
        put_cue_entry(&mut w, entry);
    }
    buf
}

/// Decode `count` cue entries from a table data block. A count past the
/// end of the block is clamped to the entries the block holds.
pub fn decode_cue_table(buf: &[u8], count: u64) -> Vec<CueEntry> {
    let count = count.min(buf.len() as u64 / CUE_ENTRY_SIZE);
    let mut r = FieldReader::new(buf);
    (0..count).map(|_| get_cue_entry(&mut r)).collect()
}

/// Encode a trigger table into an alignment-padded data block.
pub fn encode_trigger_table(entries: &[TriggerEntry]) -> AlignedBuf {
    let size = table_data_size(entries.len() as u64, TRIGGER_ENTRY_SIZE);
    let mut buf = AlignedBuf::frame_aligned(size as usize);
    let mut w = FieldWriter::new(&mut buf);
    for entry in entries {
        put_trigger_entry(&mut w, entry);
    }
    buf
}

/// Decode `count` trigger entries from a table data block. A count past
/// the end of the block is clamped to the entries the block holds.
pub fn decode_trigger_table(buf: &[u8], count: u64) -> Vec<TriggerEntry> {
    let count = count.min(buf.len() as u64 / TRIGGER_ENTRY_SIZE);
    let mut r = FieldReader::new(buf);
    (0..count).map(|_| get_trigger_entry(&mut r)).collect()
}

/// Encode an overrun table into an alignment-padded data block.
/// Overrun entries share the trigger entry layout.
pub fn encode_overrun_table(entries: &[OverrunEntry]) -> AlignedBuf {
    let size = table_data_size(entries.len() as u64, TRIGGER_ENTRY_SIZE);
    let mut buf = AlignedBuf::frame_aligned(size as usize);
    let mut w = FieldWriter::new(&mut buf);
    for entry in entries {
        w.put_i64(entry.timestamp.sec);
        w.put_i64(entry.timestamp.nsec);
        w.put_u64(entry.hw_timestamp);
        w.put_u16(entry.intersample_offset);
        w.put_i64(entry.overrun_type);
        w.put_i32(entry.streamnum);
        w.skip(26);
    }
    buf
}

/// Decode `count` overrun entries from a table data block. A count past
/// the end of the block is clamped to the entries the block holds.
pub fn decode_overrun_table(buf: &[u8], count: u64) -> Vec<OverrunEntry> {
    let count = count.min(buf.len() as u64 / TRIGGER_ENTRY_SIZE);
    let mut r = FieldReader::new(buf);
    (0..count)
        .map(|_| {
            let entry = OverrunEntry {
                timestamp: Timespec::new(r.get_i64(), r.get_i64()),
                hw_timestamp: r.get_u64(),
                intersample_offset: r.get_u16(),
                overrun_type: r.get_i64(),
                streamnum: r.get_i32(),
            };
            r.skip(26);
            entry
        })
        .collect()
}

fn write_header_frame(file: &mut File, frametype: u32, header: &AlignedBuf) -> Result<()> {
    let mut preamble = Preamble::new(frametype);
    preamble.headsize = HEADSIZE_MIN;
    write_frame(file, &mut preamble, Some(header), None)
}

/// Write a tag frame at the current cursor position.
pub(crate) fn write_tag_frame(file: &mut File, tag: &str, valid: bool) -> Result<()> {
    write_header_frame(file, frame_type::TAG, &encode_tag(tag, valid))
}

/// Write a user-text (comment) frame at the current cursor position.
pub(crate) fn write_usertext_frame(file: &mut File, text: &str) -> Result<()> {
    write_header_frame(file, frame_type::USERTEXT, &encode_usertext(text, true))
}

/// Write a bookmark frame at the current cursor position.
pub(crate) fn write_bookmark_frame(file: &mut File, bookmark: &Bookmark) -> Result<()> {
    write_header_frame(file, frame_type::BOOKMARK, &encode_bookmark(bookmark, true))
}

fn write_table_frame(file: &mut File, frametype: u32, count: u64, data: &AlignedBuf) -> Result<()> {
    let mut preamble = Preamble::new(frametype);
    preamble.headsize = HEADSIZE_MIN;
    preamble.datasize = data.len() as u64;
    let header = encode_table_header(count);
    write_frame(file, &mut preamble, Some(&header), Some(data))
}

/// Write a cue table frame. Empty tables write nothing.
pub(crate) fn write_cue_frame(file: &mut File, entries: &[CueEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let data = encode_cue_table(entries);
    write_table_frame(file, frame_type::CUE, entries.len() as u64, &data)
}

/// Write a trigger table frame. Empty tables write nothing.
pub(crate) fn write_trigger_frame(file: &mut File, entries: &[TriggerEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let data = encode_trigger_table(entries);
    write_table_frame(file, frame_type::TRIGGER, entries.len() as u64, &data)
}

/// Write an overrun table frame. Empty tables write nothing.
pub(crate) fn write_overrun_frame(file: &mut File, entries: &[OverrunEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    let data = encode_overrun_table(entries);
    write_table_frame(file, frame_type::OVERRUN, entries.len() as u64, &data)
}

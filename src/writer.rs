//! Creating IQX recordings.
//!
//! [`IqxWriterBuilder`] collects the recording name, streams and initial
//! metadata, then [`IqxWriterBuilder::create`] writes the prologue (a
//! placeholder file descriptor, one descriptor frame per stream, the
//! payload-start marker) and hands out an [`IqxWriter`].
//!
//! Payload frames are append-only. Cue, trigger and overrun entries
//! accumulate in memory and are written as epilogue tables at close, when
//! the file descriptor is patched in place with the final offsets, the
//! duration and the completeness flag. Dropping an unclosed writer closes
//! it best-effort.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace, warn};

use crate::alloc::AlignedBuf;
use crate::descriptor::{FileDescriptor, IqStreamParameters, StreamDescriptor};
use crate::digiq;
use crate::epilogue::{self, Bookmark};
use crate::error::{Error, Result};
use crate::frame::{self, Preamble};
use crate::time::Timespec;
use crate::types::{
    frame_type, CueEntry, Geolocation, OverrunEntry, StreamType, TriggerEntry, DATA_ALIGNMENT,
    HEADSIZE_MIN, MAX_CUE_ENTRIES, MAX_OVERRUN_ENTRIES, MAX_TRIGGER_ENTRIES,
};
use crate::wire::{sample_bytes, FieldWriter};

/// Builder for a new IQX recording.
#[derive(Debug, Default)]
pub struct IqxWriterBuilder {
    name: String,
    comment: String,
    tags: Vec<String>,
    iq_streams: Vec<(String, IqStreamParameters)>,
    gps_stream: Option<(String, u32)>,
}

impl IqxWriterBuilder {
    /// Start a recording with the given user-visible name.
    pub fn new(name: &str) -> Self {
        IqxWriterBuilder {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Set the initial user comment.
    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = comment.to_owned();
        self
    }

    /// Add one tag.
    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_owned());
        self
    }

    /// Replace the tag set.
    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Add an I/Q stream. The parameter block decides the stream's
    /// resolution (16-bit unless `resolution` is 12).
    pub fn add_iq_stream(mut self, source: &str, params: IqStreamParameters) -> Self {
        self.iq_streams.push((source.to_owned(), params));
        self
    }

    /// Add a geolocation stream with the given update rate in fixes per
    /// second. It is numbered after all I/Q streams.
    pub fn gps_stream(mut self, source: &str, update_rate: u32) -> Self {
        self.gps_stream = Some((source.to_owned(), update_rate));
        self
    }

    /// Create the file and write the prologue.
    pub fn create(self, path: impl AsRef<Path>) -> Result<IqxWriter> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        let niq = self.iq_streams.len();
        let nstreams = niq + usize::from(self.gps_stream.is_some());

        let now = chrono::Local::now();
        let mut descriptor = FileDescriptor::placeholder(
            &self.name,
            nstreams as u32,
            uuid::Uuid::new_v4().into_bytes(),
        );
        descriptor.start_time = Timespec::new(now.timestamp(), now.timestamp_subsec_nanos() as i64);
        descriptor.tz_offset = now.offset().local_minus_utc();
        write_file_descriptor(&mut file, &descriptor)?;
        debug!("created recording '{}' ({nstreams} streams)", self.name);

        let mut stream_types = Vec::with_capacity(nstreams);
        let mut sample_rates = Vec::with_capacity(nstreams);
        for (i, (source, params)) in self.iq_streams.iter().enumerate() {
            let stream_type = if params.resolution == 12 {
                StreamType::Iq12
            } else {
                StreamType::Iq16
            };
            write_iq_stream_descriptor(&mut file, i as i32, source, params, stream_type)?;
            stream_types.push(stream_type);
            sample_rates.push(if params.samplerate_valid {
                params.samplerate
            } else {
                0.0
            });
        }
        if let Some((source, update_rate)) = &self.gps_stream {
            write_gps_stream_descriptor(&mut file, niq as i32, source, *update_rate)?;
            stream_types.push(StreamType::Geolocation);
            sample_rates.push(0.0);
        }

        frame::write_marker_frame(&mut file, frame_type::PAYLOADSTART)?;
        let payload_offset = file.stream_position()? as i64;

        Ok(IqxWriter {
            file,
            closed: false,
            descriptor,
            payload_offset,
            duration: Timespec::default(),
            comment: self.comment,
            tags: self.tags,
            bookmarks: Vec::new(),
            cues: Vec::new(),
            triggers: Vec::new(),
            overruns: Vec::new(),
            stream_types,
            sample_rates,
            samples: vec![0; nstreams],
            sequence_no: vec![0; nstreams],
        })
    }
}

/// An open IQX recording being written.
#[derive(Debug)]
pub struct IqxWriter {
    file: File,
    closed: bool,
    descriptor: FileDescriptor,
    payload_offset: i64,
    duration: Timespec,
    comment: String,
    tags: Vec<String>,
    bookmarks: Vec<Bookmark>,
    cues: Vec<CueEntry>,
    triggers: Vec<TriggerEntry>,
    overruns: Vec<OverrunEntry>,
    stream_types: Vec<StreamType>,
    sample_rates: Vec<f64>,
    samples: Vec<u64>,
    sequence_no: Vec<i64>,
}

impl IqxWriter {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid_state("writer has been closed"));
        }
        Ok(())
    }

    fn check_stream(&self, streamno: usize, expected: StreamType) -> Result<()> {
        let found = self
            .stream_types
            .get(streamno)
            .ok_or(Error::InvalidStreamIndex { index: streamno })?;
        if *found != expected {
            return Err(Error::invalid_state("wrong stream type for this frame"));
        }
        Ok(())
    }

    /// Byte offset of the first payload frame.
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset as u64
    }

    /// Recording UUID in canonical hyphenated form.
    pub fn uuid(&self) -> String {
        self.descriptor.uuid_string()
    }

    /// Current recording duration, derived from the appended samples.
    pub fn duration(&self) -> Timespec {
        self.duration
    }

    /// Append a 16-bit I/Q data frame: interleaved I/Q pairs in host
    /// order. The frame is stamped with the duration before the append.
    pub fn write_data_frame(&mut self, streamno: usize, sequenceno: i64, data: &[i16]) -> Result<()> {
        self.check_open()?;
        self.check_stream(streamno, StreamType::Iq16)?;
        let timestamp = self.duration;
        self.account_samples(streamno, data.len() as u64 / 2);
        self.write_payload_frame(
            frame_type::IQDATA,
            streamno as i32,
            timestamp,
            sequenceno,
            sample_bytes(data),
        )
    }

    /// Append a 12-bit I/Q data frame of DIGIQ-packed bytes. The length
    /// must be a whole number of 32-byte DIGIQ words.
    pub fn write_packed_data_frame(
        &mut self,
        streamno: usize,
        sequenceno: i64,
        packed: &[u8],
    ) -> Result<()> {
        self.check_open()?;
        self.check_stream(streamno, StreamType::Iq12)?;
        if packed.len() % digiq::DIGIQ_WORD_SIZE != 0 {
            return Err(Error::SizeNotAligned {
                size: packed.len(),
                unit: digiq::DIGIQ_WORD_SIZE,
            });
        }
        let timestamp = self.duration;
        let samples =
            (packed.len() / digiq::DIGIQ_WORD_SIZE * digiq::SAMPLES_COMPLEX12_PER_WORD) as u64;
        self.account_samples(streamno, samples);
        self.write_payload_frame(
            frame_type::IQDATA,
            streamno as i32,
            timestamp,
            sequenceno,
            packed,
        )
    }

    /// Append a geolocation frame with one GPS fix.
    pub fn write_geolocation_frame(
        &mut self,
        streamno: usize,
        sequenceno: i64,
        fix: &Geolocation,
    ) -> Result<()> {
        self.check_open()?;
        self.check_stream(streamno, StreamType::Geolocation)?;
        let mut data = AlignedBuf::frame_aligned(DATA_ALIGNMENT as usize);
        let mut w = FieldWriter::new(&mut data);
        w.put_i64(fix.timestamp.sec);
        w.put_i64(fix.timestamp.nsec);
        w.put_f64(fix.latitude);
        w.put_f64(fix.longitude);
        w.put_f64(fix.altitude);
        w.put_f64(fix.track);
        w.put_f64(fix.speed);
        w.put_f64(fix.climb);
        let timestamp = self.duration;
        self.write_payload_frame(
            frame_type::GEOLOC,
            streamno as i32,
            timestamp,
            sequenceno,
            &data,
        )
    }

    fn account_samples(&mut self, streamno: usize, samples: u64) {
        self.samples[streamno] += samples;
        let rate = self.sample_rates[streamno];
        if rate > 0.0 {
            self.duration = Timespec::from_secs_f64(self.samples[streamno] as f64 / rate);
        }
    }

    fn write_payload_frame(
        &mut self,
        frametype: u32,
        streamnum: i32,
        timestamp: Timespec,
        sequenceno: i64,
        data: &[u8],
    ) -> Result<()> {
        let mut preamble = Preamble::new(frametype);
        preamble.streamnum = streamnum;
        preamble.headsize = HEADSIZE_MIN;
        preamble.datasize = data.len() as u64;
        preamble.timestamp = timestamp;
        let header = encode_data_header(sequenceno);
        frame::write_frame(&mut self.file, &mut preamble, Some(&header), Some(data))
    }

    // ------------------------------------------------------------------
    // metadata accumulated for the epilogue
    // ------------------------------------------------------------------

    /// Set or extend the user comment. A comment set while one already
    /// exists is concatenated with `"; "`.
    pub fn set_comment(&mut self, comment: &str) {
        if self.comment.is_empty() {
            self.comment = comment.to_owned();
        } else {
            self.comment.push_str("; ");
            self.comment.push_str(comment);
        }
    }

    /// Replace the tag set.
    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    /// Replace the bookmark set.
    pub fn set_bookmarks(&mut self, bookmarks: Vec<Bookmark>) {
        self.bookmarks = bookmarks;
    }

    /// Override the recording start time, e.g. for imported recordings.
    pub fn set_start_time(&mut self, start_time: Timespec) {
        self.descriptor.start_time = start_time;
    }

    /// Override the recording duration.
    pub fn set_duration(&mut self, duration: Timespec) {
        self.duration = duration;
    }

    /// Record a cue entry. Entries beyond the table capacity are silently
    /// dropped.
    pub fn add_cue_entry(&mut self, cue: CueEntry) {
        if (self.cues.len() as u64) < MAX_CUE_ENTRIES {
            self.cues.push(cue);
        } else {
            trace!("cue table full, dropping entry");
        }
    }

    /// Record a trigger event. Entries beyond the table capacity are
    /// silently dropped.
    pub fn add_trigger_entry(&mut self, trigger: TriggerEntry) {
        if (self.triggers.len() as u64) < MAX_TRIGGER_ENTRIES {
            self.triggers.push(trigger);
        } else {
            trace!("trigger table full, dropping entry");
        }
    }

    /// Record an overrun event. Entries beyond the table capacity are
    /// silently dropped.
    pub fn add_overrun_entry(&mut self, overrun: OverrunEntry) {
        if (self.overruns.len() as u64) < MAX_OVERRUN_ENTRIES {
            self.overruns.push(overrun);
        } else {
            trace!("overrun table full, dropping entry");
        }
    }

    /// Current sequence counter of one stream.
    pub fn sequence_no(&self, streamno: usize) -> Result<i64> {
        self.sequence_no
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Set the sequence counter of one stream, e.g. when resuming an
    /// interrupted recording.
    pub fn set_sequence_no(&mut self, streamno: usize, sequenceno: i64) -> Result<()> {
        *self
            .sequence_no
            .get_mut(streamno)
            .ok_or(Error::InvalidStreamIndex { index: streamno })? = sequenceno;
        Ok(())
    }

    // ------------------------------------------------------------------
    // finalization
    // ------------------------------------------------------------------

    /// Finalize the recording: write the payload-end marker, the epilogue
    /// records and the EOF frame, then patch the file descriptor in place.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;

        frame::write_marker_frame(&mut self.file, frame_type::PAYLOADEND)?;
        let epilogue_offset = self.file.stream_position()? as i64;

        for bookmark in &self.bookmarks {
            epilogue::write_bookmark_frame(&mut self.file, bookmark)?;
        }
        for tag in &self.tags {
            epilogue::write_tag_frame(&mut self.file, tag, true)?;
        }
        if !self.comment.is_empty() {
            epilogue::write_usertext_frame(&mut self.file, &self.comment)?;
        }
        epilogue::write_trigger_frame(&mut self.file, &self.triggers)?;
        epilogue::write_cue_frame(&mut self.file, &self.cues)?;
        epilogue::write_overrun_frame(&mut self.file, &self.overruns)?;
        frame::write_marker_frame(&mut self.file, frame_type::EOF)?;

        self.descriptor.payload_offset = self.payload_offset;
        self.descriptor.epilogue_offset = epilogue_offset;
        self.descriptor.duration = self.duration;
        self.descriptor.complete = true;
        self.file.seek(SeekFrom::Start(0))?;
        write_file_descriptor(&mut self.file, &self.descriptor)?;

        self.closed = true;
        debug!(
            "closed recording '{}' (duration {:.3} s)",
            self.descriptor.name,
            self.duration.as_secs_f64()
        );
        Ok(())
    }
}

impl Drop for IqxWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("failed to finalize recording on drop: {e}");
            }
        }
    }
}

fn write_file_descriptor(file: &mut File, descriptor: &FileDescriptor) -> Result<()> {
    let header = descriptor.encode();
    let mut preamble = Preamble::new(frame_type::FILEDESC);
    preamble.headsize = header.len() as u64;
    frame::write_frame(file, &mut preamble, Some(&header), None)
}

fn write_iq_stream_descriptor(
    file: &mut File,
    streamnum: i32,
    source: &str,
    params: &IqStreamParameters,
    stream_type: StreamType,
) -> Result<()> {
    // data rate in bytes/s: 4 bytes per 16-bit sample, 3 per 12-bit sample
    // scaled by the DIGIQ word slack
    let bytes_per_sample = f64::from(params.resolution * 2) / 8.0;
    let datarate = params.samplerate
        * if params.resolution == 12 {
            bytes_per_sample * 256.0 / 240.0
        } else {
            bytes_per_sample
        };
    let desc = StreamDescriptor {
        stream_type: stream_type.as_raw(),
        framesize_min: 0,
        framesize_max: 0,
        datarate,
        framerate: 0.0,
        source: source.to_owned(),
    };
    let header = desc.encode();
    let data = params.encode();
    let mut preamble = Preamble::new(frame_type::STREAMDESC);
    preamble.streamnum = streamnum;
    preamble.headsize = header.len() as u64;
    preamble.datasize = data.len() as u64;
    frame::write_frame(file, &mut preamble, Some(&header), Some(&data))
}

fn write_gps_stream_descriptor(
    file: &mut File,
    streamnum: i32,
    source: &str,
    update_rate: u32,
) -> Result<()> {
    let desc = StreamDescriptor {
        stream_type: StreamType::Geolocation.as_raw(),
        framesize_min: 0,
        framesize_max: 0,
        datarate: f64::from(update_rate),
        framerate: 0.0,
        source: source.to_owned(),
    };
    let header = desc.encode();
    let mut preamble = Preamble::new(frame_type::STREAMDESC);
    preamble.streamnum = streamnum;
    preamble.headsize = header.len() as u64;
    frame::write_frame(file, &mut preamble, Some(&header), None)
}

fn encode_data_header(sequenceno: i64) -> AlignedBuf {
    let mut buf = AlignedBuf::frame_aligned(HEADSIZE_MIN as usize);
    let mut w = FieldWriter::new(&mut buf);
    w.put_i64(sequenceno);
    w.put_u32(0); // checksum, unused
    buf
}

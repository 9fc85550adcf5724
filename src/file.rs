//! Reading and editing finalized IQX recordings.
//!
//! [`IqxFile::open`] validates the file descriptor, walks the stream
//! descriptors, scans the epilogue for metadata and loads (or reconstructs)
//! the cue index. All I/O is blocking and single-threaded; any format
//! violation is a fatal error.
//!
//! [`IqxFile::open_edit`] additionally records the byte offsets of the
//! editable epilogue records so tags, the comment and the recording name can
//! be changed in place without rewriting payload data.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use log::{debug, trace};

use crate::alloc::AlignedBuf;
use crate::descriptor::{FileDescriptor, IqStreamParameters, StreamDescriptor};
use crate::digiq;
use crate::epilogue::{self, Bookmark, MetaOffsets};
use crate::error::{Error, Result};
use crate::frame::{self, Preamble};
use crate::time::{self, Timespec};
use crate::types::{
    frame_type, CueEntry, ExportPermission, OverrunEntry, StreamType, TriggerEntry,
    CUE_ENTRY_SIZE, MAX_CUE_ENTRIES, PREAMBLE_SIZE, TRIGGER_ENTRY_SIZE,
};
use crate::wire;

/// A finalized IQX recording opened for reading, or for in-place metadata
/// editing.
#[derive(Debug)]
pub struct IqxFile {
    file: File,
    edit: bool,
    descriptor: FileDescriptor,
    comment: String,
    tags: Vec<String>,
    bookmarks: Vec<Bookmark>,
    cues: Vec<CueEntry>,
    triggers: Vec<TriggerEntry>,
    overruns: Vec<OverrunEntry>,
    has_overrun: bool,
    meta: MetaOffsets,
    stream_types: Vec<StreamType>,
    stream_sources: Vec<String>,
    stream_max_frame_sizes: Vec<u64>,
    stream_registry: HashMap<String, usize>,
    iq_stream_numbers: Vec<usize>,
    iq_parameters: HashMap<String, IqStreamParameters>,
    data_rates: Vec<f64>,
    sample_rates: Vec<f64>,
    gps_update_rate: u32,
    frames_per_stream: Vec<u64>,
    samples_per_stream: Vec<u64>,
}

impl IqxFile {
    /// Open a recording for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_impl(path.as_ref(), false)
    }

    /// Open a recording for in-place metadata editing.
    pub fn open_edit(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_impl(path.as_ref(), true)
    }

    /// True if the path refers to a readable, finalized IQX file.
    /// Any failure, including I/O errors, yields `false`.
    pub fn is_iqx_file(path: impl AsRef<Path>) -> bool {
        Self::open(path).is_ok()
    }

    fn open_impl(path: &Path, edit: bool) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(Error::NotRegularFile {
                path: path.to_owned(),
            });
        }
        let mut file = OpenOptions::new().read(true).write(edit).open(path)?;

        let (preamble, desc_frame) = frame::read_frame(&mut file)?;
        frame::assert_frame_type(frame_type::FILEDESC, &preamble)?;
        let descriptor = FileDescriptor::decode(&desc_frame.header)?;
        validate(&descriptor)?;
        debug!(
            "opened '{}' ({} streams, duration {:.3} s)",
            descriptor.name,
            descriptor.nstreams,
            descriptor.duration.as_secs_f64()
        );

        let mut iqx = IqxFile {
            file,
            edit,
            descriptor,
            comment: String::new(),
            tags: Vec::new(),
            bookmarks: Vec::new(),
            cues: Vec::new(),
            triggers: Vec::new(),
            overruns: Vec::new(),
            has_overrun: false,
            meta: MetaOffsets::default(),
            stream_types: Vec::new(),
            stream_sources: Vec::new(),
            stream_max_frame_sizes: Vec::new(),
            stream_registry: HashMap::new(),
            iq_stream_numbers: Vec::new(),
            iq_parameters: HashMap::new(),
            data_rates: Vec::new(),
            sample_rates: Vec::new(),
            gps_update_rate: 0,
            frames_per_stream: Vec::new(),
            samples_per_stream: Vec::new(),
        };
        iqx.read_stream_descriptors()?;
        iqx.read_metadata()?;
        iqx.read_payload_accounting()?;
        iqx.file
            .seek(SeekFrom::Start(iqx.descriptor.payload_offset as u64))?;
        Ok(iqx)
    }

    fn read_stream_descriptors(&mut self) -> Result<()> {
        let nstreams = self.descriptor.nstreams as usize;
        for i in 0..nstreams {
            let (preamble, frame) = frame::read_frame(&mut self.file)?;
            frame::assert_frame_type(frame_type::STREAMDESC, &preamble)?;
            let desc = StreamDescriptor::decode(&frame.header)?;

            let source = if desc.source.is_empty() {
                format!("stream#{i}")
            } else {
                desc.source.clone()
            };
            let stream_type = StreamType::from_raw(desc.stream_type);
            trace!("stream {i}: {stream_type} '{source}'");

            self.stream_max_frame_sizes.push(desc.framesize_max);
            self.stream_types.push(stream_type);

            match stream_type {
                StreamType::Iq16 | StreamType::Iq12 => {
                    self.iq_stream_numbers.push(i);
                    self.stream_registry.insert(source.clone(), i);
                    self.stream_registry.insert(format!("{source}_I"), i);
                    self.stream_registry.insert(format!("{source}_Q"), i);

                    let params = if frame.data.len() >= IqStreamParameters::SIZE {
                        IqStreamParameters::decode(&frame.data)?
                    } else {
                        IqStreamParameters::default()
                    };
                    self.data_rates.push(desc.datarate);
                    self.sample_rates.push(params.samplerate);
                    self.iq_parameters.insert(source.clone(), params);
                }
                StreamType::Geolocation => {
                    self.gps_update_rate = desc.datarate as u32;
                    self.data_rates.push(desc.datarate);
                    self.sample_rates.push(0.0);
                }
                StreamType::Other(_) => {
                    self.data_rates.push(desc.datarate);
                    self.sample_rates.push(0.0);
                }
            }
            self.stream_sources.push(source);
        }
        Ok(())
    }

    /// Walk the epilogue from the descriptor's offset up to the EOF frame.
    fn read_metadata(&mut self) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(self.descriptor.epilogue_offset as u64))?;

        loop {
            let (preamble, frame) = frame::read_frame(&mut self.file)?;
            match preamble.frametype {
                frame_type::USERTEXT => {
                    let (text, valid) = epilogue::decode_usertext(&frame.header);
                    if valid {
                        self.comment = text;
                    }
                    if self.edit {
                        self.meta.usertext_frame = Some(self.frame_offset(&preamble)?);
                    }
                }
                frame_type::TAG => {
                    let (tag, valid) = epilogue::decode_tag(&frame.header);
                    if valid {
                        self.tags.push(tag);
                    }
                    if self.edit {
                        let offset = self.frame_offset(&preamble)?;
                        self.meta.tag_frames.push(offset);
                    }
                }
                frame_type::BOOKMARK => {
                    let (bookmark, valid) = epilogue::decode_bookmark(&frame.header);
                    if valid {
                        self.bookmarks.push(bookmark);
                    }
                }
                frame_type::TRIGGER => {
                    let (count, data) =
                        self.read_table_body(&preamble, TRIGGER_ENTRY_SIZE, "trigger")?;
                    self.triggers = epilogue::decode_trigger_table(&data, count);
                }
                frame_type::CUE => {
                    let (count, data) = self.read_table_body(&preamble, CUE_ENTRY_SIZE, "cue")?;
                    self.cues = epilogue::decode_cue_table(&data, count);
                }
                frame_type::OVERRUN => {
                    self.has_overrun = true;
                    let (count, data) =
                        self.read_table_body(&preamble, TRIGGER_ENTRY_SIZE, "overrun")?;
                    self.overruns = epilogue::decode_overrun_table(&data, count);
                }
                frame_type::EOF => {
                    if self.edit {
                        self.meta.eof_frame = Some(self.frame_offset(&preamble)?);
                    }
                    return Ok(());
                }
                _ => {}
            }
        }
    }

    /// Offset of the frame whose whole content was just consumed.
    fn frame_offset(&mut self, preamble: &Preamble) -> Result<u64> {
        Ok(self.file.stream_position()? - preamble.framesize)
    }

    /// Read the header and data of a cue/trigger/overrun frame; only the
    /// preamble was consumed so far.
    fn read_table_body(
        &mut self,
        preamble: &Preamble,
        entry_size: u64,
        what: &'static str,
    ) -> Result<(u64, AlignedBuf)> {
        let mut header = AlignedBuf::frame_aligned(preamble.headsize as usize);
        frame::read_exact_or(&mut self.file, &mut header, what)?;
        let count = epilogue::decode_table_header(&header);
        if count > preamble.datasize / entry_size {
            return Err(Error::invalid_format("table count exceeds frame data"));
        }
        let mut data = AlignedBuf::frame_aligned(preamble.datasize as usize);
        frame::read_exact_or(&mut self.file, &mut data, what)?;
        Ok((count, data))
    }

    /// Fill the per-stream frame and sample counts, either from the cue
    /// index or by scanning the payload and reconstructing cue entries.
    fn read_payload_accounting(&mut self) -> Result<()> {
        let nstreams = self.descriptor.nstreams as usize;
        self.frames_per_stream = vec![0; nstreams];
        self.samples_per_stream = vec![0; nstreams];

        if !self.cues.is_empty() {
            let duration = self.descriptor.duration;
            for i in 0..nstreams {
                if self.stream_types[i].is_iq() {
                    self.samples_per_stream[i] =
                        time::sample_from_timestamp(self.sample_rates[i], duration);
                }
            }
            for cue in &self.cues {
                if let Ok(i) = usize::try_from(cue.streamnum) {
                    if i < nstreams {
                        self.frames_per_stream[i] += 1;
                    }
                }
            }
            return Ok(());
        }

        // no cue index stored: scan the payload frame by frame
        debug!("no cue index found, scanning payload");
        let mut offset = self
            .file
            .seek(SeekFrom::Start(self.descriptor.payload_offset as u64))?;
        loop {
            let preamble = frame::read_preamble(&mut self.file)?;
            let next_offset = self
                .file
                .seek(SeekFrom::Current((preamble.framesize - PREAMBLE_SIZE) as i64))?;
            match preamble.frametype {
                frame_type::IQDATA => {
                    let i = usize::try_from(preamble.streamnum)
                        .map_err(|_| Error::invalid_format("payload frame without stream"))?;
                    if i >= nstreams {
                        return Err(Error::invalid_format("payload frame without stream"));
                    }
                    // the same soft cap the writer applies when recording
                    if (self.cues.len() as u64) < MAX_CUE_ENTRIES {
                        self.cues.push(CueEntry {
                            timestamp: time::timestamp_from_sample(
                                self.sample_rates[i],
                                self.samples_per_stream[i],
                            ),
                            offset: offset as i64,
                            streamnum: preamble.streamnum,
                        });
                    } else {
                        trace!("cue table full, dropping entry");
                    }
                    self.frames_per_stream[i] += 1;
                    self.samples_per_stream[i] += match self.stream_types[i] {
                        StreamType::Iq12 => {
                            preamble.datasize / digiq::DIGIQ_WORD_SIZE as u64
                                * digiq::SAMPLES_COMPLEX12_PER_WORD as u64
                        }
                        _ => preamble.datasize / 4,
                    };
                }
                frame_type::PAYLOADEND => return Ok(()),
                _ => {}
            }
            offset = next_offset;
        }
    }

    // ------------------------------------------------------------------
    // descriptor getters
    // ------------------------------------------------------------------

    /// User-visible recording name.
    pub fn description_name(&self) -> &str {
        &self.descriptor.name
    }

    /// Recording UUID in canonical hyphenated form.
    pub fn uuid(&self) -> String {
        self.descriptor.uuid_string()
    }

    /// Recording start time (seconds since the epoch).
    pub fn start_time(&self) -> Timespec {
        self.descriptor.start_time
    }

    /// Timezone offset from UTC in seconds at recording time.
    pub fn tz_offset(&self) -> i32 {
        self.descriptor.tz_offset
    }

    /// Recording duration.
    pub fn duration(&self) -> Timespec {
        self.descriptor.duration
    }

    /// Byte offset of the first payload frame.
    pub fn payload_offset(&self) -> u64 {
        self.descriptor.payload_offset as u64
    }

    /// Byte offset of the first epilogue frame.
    pub fn epilogue_offset(&self) -> u64 {
        self.descriptor.epilogue_offset as u64
    }

    /// Number of streams in the recording.
    pub fn number_of_streams(&self) -> usize {
        self.descriptor.nstreams as usize
    }

    // ------------------------------------------------------------------
    // metadata getters
    // ------------------------------------------------------------------

    /// The user comment, empty if none was recorded.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The valid tags, in file order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The valid bookmarks, in file order.
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    /// True if the capture hardware reported at least one overrun.
    pub fn has_overrun(&self) -> bool {
        self.has_overrun
    }

    /// The recorded overrun events.
    pub fn overruns(&self) -> &[OverrunEntry] {
        &self.overruns
    }

    /// GPS update rate in fixes per second, 0 without a geolocation stream.
    pub fn gps_update_rate(&self) -> u32 {
        self.gps_update_rate
    }

    /// Trigger events belonging to one stream.
    pub fn triggers(&self, streamno: usize) -> Vec<TriggerEntry> {
        self.triggers
            .iter()
            .filter(|t| t.streamnum == streamno as i32)
            .copied()
            .collect()
    }

    /// All trigger events.
    pub fn all_triggers(&self) -> &[TriggerEntry] {
        &self.triggers
    }

    // ------------------------------------------------------------------
    // stream getters
    // ------------------------------------------------------------------

    /// Source names of all streams, indexed by stream number.
    pub fn stream_sources(&self) -> &[String] {
        &self.stream_sources
    }

    /// Source name of one stream.
    pub fn stream_source(&self, streamno: usize) -> Result<&str> {
        self.stream_sources
            .get(streamno)
            .map(String::as_str)
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Type of one stream.
    pub fn stream_type(&self, streamno: usize) -> Result<StreamType> {
        self.stream_types
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Types of all streams, indexed by stream number.
    pub fn stream_types(&self) -> &[StreamType] {
        &self.stream_types
    }

    /// Largest frame size used by one stream.
    pub fn stream_max_frame_size(&self, streamno: usize) -> Result<u64> {
        self.stream_max_frame_sizes
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Stream numbers of the I/Q streams.
    pub fn iq_stream_numbers(&self) -> &[usize] {
        &self.iq_stream_numbers
    }

    /// Resolve a source name, or a `_I`/`_Q` component alias, to its stream
    /// number.
    pub fn stream_no(&self, name: &str) -> Result<usize> {
        self.stream_registry
            .get(name)
            .copied()
            .ok_or_else(|| Error::unknown_stream(name))
    }

    /// Number of payload frames recorded for one stream.
    pub fn stream_no_of_frames(&self, streamno: usize) -> Result<u64> {
        self.frames_per_stream
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Number of complex samples recorded for one stream.
    pub fn stream_no_of_samples(&self, streamno: usize) -> Result<u64> {
        self.samples_per_stream
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Data rate of one stream in bytes per second.
    pub fn iq_stream_data_rate(&self, streamno: usize) -> Result<f64> {
        self.data_rates
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Sample rate of one I/Q stream in complex samples per second.
    pub fn iq_stream_sample_rate(&self, streamno: usize) -> Result<f64> {
        self.sample_rates
            .get(streamno)
            .copied()
            .ok_or(Error::InvalidStreamIndex { index: streamno })
    }

    /// Measurement parameters of the I/Q stream with the given source name.
    pub fn iq_stream_parameters(&self, source: &str) -> Result<IqStreamParameters> {
        self.iq_parameters
            .get(source)
            .copied()
            .ok_or_else(|| Error::unknown_stream(source))
    }

    /// Export permission of one stream; `Unknown` when the recorded field
    /// was never marked valid.
    pub fn export_permission(&self, streamno: usize) -> Result<ExportPermission> {
        let source = self.stream_source(streamno)?;
        let params = self.iq_stream_parameters(source)?;
        Ok(if params.export_permission_valid {
            params.export_permission
        } else {
            ExportPermission::Unknown
        })
    }

    // ------------------------------------------------------------------
    // timing and cue index
    // ------------------------------------------------------------------

    /// Recording timestamp of a sample index on one stream.
    pub fn timestamp_from_sample(&self, streamno: usize, sample: u64) -> Result<Timespec> {
        let rate = self.iq_stream_sample_rate(streamno)?;
        Ok(time::timestamp_from_sample(rate, sample))
    }

    /// Sample index of a recording timestamp on one stream.
    pub fn sample_from_timestamp(&self, streamno: usize, timestamp: Timespec) -> Result<u64> {
        let rate = self.iq_stream_sample_rate(streamno)?;
        Ok(time::sample_from_timestamp(rate, timestamp))
    }

    fn stream_cues(&self, streamno: usize) -> Vec<CueEntry> {
        self.cues
            .iter()
            .filter(|c| c.streamnum == streamno as i32)
            .copied()
            .collect()
    }

    /// The cue entry of the frame containing the given recording timestamp:
    /// the last entry of the stream with `timestamp <= t`.
    pub fn cue_entry(&self, streamno: usize, t: Timespec) -> Result<CueEntry> {
        let time = t.as_secs_f64();
        let cues = self.stream_cues(streamno);
        for cue in cues.iter().rev() {
            if time >= cue.timestamp.as_secs_f64() {
                return Ok(*cue);
            }
        }
        Err(Error::CueNotFound)
    }

    /// The cue entry of the frame after the one containing the given
    /// timestamp.
    pub fn next_cue_entry(&self, streamno: usize, t: Timespec) -> Result<CueEntry> {
        let time = t.as_secs_f64();
        let cues = self.stream_cues(streamno);
        for pair in cues.windows(2) {
            if time >= pair[0].timestamp.as_secs_f64() && time < pair[1].timestamp.as_secs_f64() {
                return Ok(pair[1]);
            }
        }
        Err(Error::CueNotFound)
    }

    // ------------------------------------------------------------------
    // sample reads
    // ------------------------------------------------------------------

    /// Read one component of an I/Q stream: `name` is the `_I` or `_Q`
    /// alias of the stream source. Values are normalized to `[-1, 1]`.
    pub fn read_array(&mut self, name: &str, nof_samples: u64, offset: u64) -> Result<Vec<f32>> {
        let streamno = self.stream_no(name)?;
        let window = self.read_window(streamno, offset, nof_samples)?;
        let start = if name.ends_with("_Q") { 1 } else { 0 };
        Ok(window
            .iter()
            .skip(start)
            .step_by(2)
            .map(|&v| v as f32 / i16::MAX as f32)
            .collect())
    }

    /// Read interleaved I/Q pairs of a stream by source name, normalized
    /// to `[-1, 1]`.
    pub fn read_channel(&mut self, name: &str, nof_samples: u64, offset: u64) -> Result<Vec<f32>> {
        let streamno = self.stream_no(name)?;
        let window = self.read_window(streamno, offset, nof_samples)?;
        Ok(window
            .iter()
            .map(|&v| v as f32 / i16::MAX as f32)
            .collect())
    }

    /// Read `nof_samples` complex samples starting at sample `offset` as
    /// raw interleaved 16-bit values, seeking frames through the cue index.
    pub fn read_window(
        &mut self,
        streamno: usize,
        offset: u64,
        nof_samples: u64,
    ) -> Result<Vec<i16>> {
        let total = self.stream_no_of_samples(streamno)?;
        let end = offset
            .checked_add(nof_samples)
            .ok_or(Error::ReadBeyondEnd { stream: streamno })?;
        if total < end {
            return Err(Error::ReadBeyondEnd { stream: streamno });
        }
        let stream_type = self.stream_type(streamno)?;
        let rate = self.iq_stream_sample_rate(streamno)?;

        let mut out: Vec<i16> = Vec::with_capacity((nof_samples * 2) as usize);
        let mut act = offset;
        let mut remaining = nof_samples;
        while remaining > 0 {
            let cue = self.cue_entry(streamno, time::timestamp_from_sample(rate, act))?;
            self.file.seek(SeekFrom::Start(cue.offset as u64))?;
            let preamble = frame::read_preamble(&mut self.file)?;
            let frame_sample = time::sample_from_timestamp(rate, cue.timestamp);
            self.file
                .seek(SeekFrom::Current(preamble.headsize as i64))?;

            let consumed = match stream_type {
                StreamType::Iq16 => {
                    // window within the frame, in 16-bit values
                    let frame_values = preamble.datasize / 2;
                    let first = act
                        .checked_sub(frame_sample)
                        .ok_or_else(|| Error::invalid_format("cue entry outside its frame"))?
                        * 2;
                    let last = (first + remaining * 2).min(frame_values);
                    if last <= first {
                        return Err(Error::invalid_format("cue entry outside its frame"));
                    }
                    self.file.seek(SeekFrom::Current((first * 2) as i64))?;
                    let mut buf = vec![0u8; ((last - first) * 2) as usize];
                    frame::read_exact_or(&mut self.file, &mut buf, "frame")?;
                    out.extend(wire::bytes_to_samples(&buf));
                    (last - first) / 2
                }
                StreamType::Iq12 => {
                    // round the window outward to whole DIGIQ words, unpack
                    // and discard the slack values
                    let word = digiq::DIGIQ_WORD_SIZE as u64;
                    let per_word = digiq::SAMPLES_COMPLEX12_PER_WORD as u64;
                    let frame_samples = preamble.datasize / word * per_word;
                    let s0 = act
                        .checked_sub(frame_sample)
                        .ok_or_else(|| Error::invalid_format("cue entry outside its frame"))?;
                    let s1 = (s0 + remaining).min(frame_samples);
                    if s1 <= s0 {
                        return Err(Error::invalid_format("cue entry outside its frame"));
                    }
                    let word_lo = s0 / per_word;
                    let word_hi = s1.div_ceil(per_word);
                    self.file.seek(SeekFrom::Current((word_lo * word) as i64))?;
                    let packed_len = ((word_hi - word_lo) * word) as usize;
                    let mut packed = vec![0u8; packed_len];
                    frame::read_exact_or(&mut self.file, &mut packed, "frame")?;
                    let mut values = vec![0i16; digiq::unpacked_len(packed_len)?];
                    digiq::unpack_12_to_16(&packed, &mut values)?;
                    let lo = ((s0 - word_lo * per_word) * 2) as usize;
                    let hi = ((s1 - word_lo * per_word) * 2) as usize;
                    out.extend_from_slice(&values[lo..hi]);
                    s1 - s0
                }
                _ => return Err(Error::invalid_state("stream carries no I/Q samples")),
            };
            act += consumed;
            remaining -= consumed;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // in-place edits
    // ------------------------------------------------------------------

    fn require_edit(&self) -> Result<()> {
        if !self.edit {
            return Err(Error::invalid_state("file not opened for editing"));
        }
        Ok(())
    }

    /// Replace the user-visible recording name by rewriting the file
    /// descriptor frame in place. The UUID is preserved.
    pub fn edit_recording_name(&mut self, name: &str) -> Result<()> {
        self.require_edit()?;
        self.descriptor.name = name.to_owned();
        self.file.seek(SeekFrom::Start(0))?;
        let header = self.descriptor.encode();
        let mut preamble = Preamble::new(frame_type::FILEDESC);
        preamble.headsize = header.len() as u64;
        frame::write_frame(&mut self.file, &mut preamble, Some(&header), None)?;
        Ok(())
    }

    /// Replace the comment. An existing user-text frame is overwritten in
    /// place; otherwise a new frame is appended before the EOF frame and
    /// the EOF frame is rewritten after it.
    pub fn edit_comment(&mut self, comment: &str) -> Result<()> {
        self.require_edit()?;
        if !self.comment.is_empty() {
            let offset = self
                .meta
                .usertext_frame
                .ok_or(Error::invalid_state("no user-text frame recorded"))?;
            self.file.seek(SeekFrom::Start(offset))?;
            epilogue::write_usertext_frame(&mut self.file, comment)?;
        } else {
            let eof = self
                .meta
                .eof_frame
                .ok_or(Error::invalid_state("no EOF frame recorded"))?;
            self.file.seek(SeekFrom::Start(eof))?;
            epilogue::write_usertext_frame(&mut self.file, comment)?;
            self.meta.usertext_frame = Some(eof);
            self.meta.eof_frame = Some(self.file.stream_position()?);
            frame::write_marker_frame(&mut self.file, frame_type::EOF)?;
        }
        self.comment = comment.to_owned();
        Ok(())
    }

    /// Replace the tag set. Existing tag frames are overwritten in place;
    /// surplus new tags are appended before the EOF frame (which is then
    /// rewritten); surplus old tags are invalidated in place.
    pub fn edit_tags(&mut self, tags: &[String]) -> Result<()> {
        self.require_edit()?;
        let existing = self.meta.tag_frames.len();
        let new = tags.len();

        if existing > 0 {
            let overwrite = existing.min(new);
            for (offset, tag) in self.meta.tag_frames[..overwrite].iter().zip(tags) {
                self.file.seek(SeekFrom::Start(*offset))?;
                epilogue::write_tag_frame(&mut self.file, tag, true)?;
            }
            if new > existing {
                let eof = self
                    .meta
                    .eof_frame
                    .ok_or(Error::invalid_state("no EOF frame recorded"))?;
                self.file.seek(SeekFrom::Start(eof))?;
                for tag in &tags[existing..] {
                    self.meta.tag_frames.push(self.file.stream_position()?);
                    epilogue::write_tag_frame(&mut self.file, tag, true)?;
                }
                self.meta.eof_frame = Some(self.file.stream_position()?);
                frame::write_marker_frame(&mut self.file, frame_type::EOF)?;
            } else if new < existing {
                for offset in self.meta.tag_frames[new..].to_vec() {
                    self.file.seek(SeekFrom::Start(offset))?;
                    epilogue::write_tag_frame(&mut self.file, "", false)?;
                }
            }
        } else {
            let eof = self
                .meta
                .eof_frame
                .ok_or(Error::invalid_state("no EOF frame recorded"))?;
            self.file.seek(SeekFrom::Start(eof))?;
            for tag in tags {
                self.meta.tag_frames.push(self.file.stream_position()?);
                epilogue::write_tag_frame(&mut self.file, tag, true)?;
            }
            self.meta.eof_frame = Some(self.file.stream_position()?);
            frame::write_marker_frame(&mut self.file, frame_type::EOF)?;
        }
        self.tags = tags.to_vec();
        Ok(())
    }
}

fn validate(descriptor: &FileDescriptor) -> Result<()> {
    if !descriptor.complete
        || descriptor.epilogue_offset == 0
        || descriptor.payload_offset == 0
    {
        return Err(Error::invalid_format("file is corrupted"));
    }
    if descriptor.duration.is_zero() {
        return Err(Error::invalid_format("recording duration is zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_iqx_file_rejects_garbage() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 8192]).unwrap();
        assert!(!IqxFile::is_iqx_file(tmp.path()));
    }

    #[test]
    fn test_open_missing_file() {
        assert!(IqxFile::open("/nonexistent/recording.iqx").is_err());
    }

    #[test]
    fn test_open_truncated_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        // valid sync words but nothing behind them
        for sync in crate::types::SYNC {
            tmp.write_all(&sync.to_ne_bytes()).unwrap();
        }
        assert!(IqxFile::open(tmp.path()).is_err());
    }
}

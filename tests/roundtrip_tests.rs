//! Integration tests: write a recording, close it, read it back.

use approx::assert_relative_eq;
use iqx_rs::{
    Bookmark, CueEntry, ExportPermission, Geolocation, IqStreamParameters, IqxFile,
    IqxWriterBuilder, OverrunEntry, Result, Timespec, TriggerEntry,
};
use tempfile::TempDir;

fn iq16_params(samplerate: f64) -> IqStreamParameters {
    IqStreamParameters {
        samplerate,
        samplerate_valid: true,
        resolution: 16,
        resolution_valid: true,
        ..Default::default()
    }
}

fn iq12_params(samplerate: f64) -> IqStreamParameters {
    IqStreamParameters {
        resolution: 12,
        ..iq16_params(samplerate)
    }
}

/// Deterministic interleaved I/Q test pattern of `n` complex samples.
fn test_samples(n: usize, seed: i32) -> Vec<i16> {
    (0..2 * n)
        .map(|i| ((i as i32 * 641 + seed * 7919) % 60000 - 30000) as i16)
        .collect()
}

/// Same pattern with the low nibble cleared, as a 12-bit stream stores it.
fn test_samples_12bit(n: usize, seed: i32) -> Vec<i16> {
    test_samples(n, seed)
        .into_iter()
        .map(|v| v & !0xF)
        .collect()
}

#[test]
fn test_basic_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let samples = test_samples(100, 1);
    let mut writer = IqxWriterBuilder::new("basic capture")
        .comment("antenna test")
        .tag("outdoor")
        .tag("site-b")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    // two frames of 50 complex samples each
    writer.write_data_frame(0, 0, &samples[..100])?;
    writer.write_data_frame(0, 1, &samples[100..])?;
    writer.close()?;

    assert!(IqxFile::is_iqx_file(&path));
    let mut file = IqxFile::open(&path)?;
    assert_eq!(file.description_name(), "basic capture");
    assert_eq!(file.comment(), "antenna test");
    assert_eq!(file.tags(), ["outdoor", "site-b"]);
    assert_eq!(file.number_of_streams(), 1);
    assert_eq!(file.stream_sources(), ["rf_a"]);
    assert_eq!(file.stream_no("rf_a")?, 0);
    assert_eq!(file.stream_no("rf_a_I")?, 0);
    assert_eq!(file.stream_no("rf_a_Q")?, 0);
    assert_eq!(file.stream_no_of_frames(0)?, 2);
    assert_eq!(file.stream_no_of_samples(0)?, 100);
    assert_eq!(file.iq_stream_sample_rate(0)?, 1000.0);
    assert_eq!(file.iq_stream_data_rate(0)?, 4000.0);
    assert_relative_eq!(file.duration().as_secs_f64(), 0.1, max_relative = 1e-9);
    assert_eq!(file.uuid().len(), 36);
    assert!(!file.has_overrun());

    // bit-exact sample recovery
    assert_eq!(file.read_window(0, 0, 100)?, samples);
    // a window starting mid-recording, crossing the frame boundary
    assert_eq!(file.read_window(0, 40, 20)?, samples[80..120]);
    Ok(())
}

#[test]
fn test_normalized_reads() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let samples = test_samples(64, 2);
    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    writer.write_data_frame(0, 0, &samples)?;
    writer.close()?;

    let mut file = IqxFile::open(&path)?;
    let channel = file.read_channel("rf_a", 64, 0)?;
    assert_eq!(channel.len(), 128);
    for (f, &s) in channel.iter().zip(&samples) {
        assert_relative_eq!(*f, s as f32 / 32767.0);
    }

    let inphase = file.read_array("rf_a_I", 10, 3)?;
    let quadrature = file.read_array("rf_a_Q", 10, 3)?;
    assert_eq!(inphase.len(), 10);
    for k in 0..10 {
        assert_relative_eq!(inphase[k], samples[2 * (3 + k)] as f32 / 32767.0);
        assert_relative_eq!(quadrature[k], samples[2 * (3 + k) + 1] as f32 / 32767.0);
    }
    Ok(())
}

#[test]
fn test_read_beyond_end() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    writer.write_data_frame(0, 0, &test_samples(50, 3))?;
    writer.close()?;

    let mut file = IqxFile::open(&path)?;
    assert!(file.read_window(0, 0, 50).is_ok());
    assert!(matches!(
        file.read_window(0, 40, 11),
        Err(iqx_rs::Error::ReadBeyondEnd { stream: 0 })
    ));
    // a window whose end would not even fit in u64
    assert!(matches!(
        file.read_window(0, u64::MAX, 2),
        Err(iqx_rs::Error::ReadBeyondEnd { stream: 0 })
    ));
    assert!(file.stream_no("rf_b").is_err());
    Ok(())
}

#[test]
fn test_cue_index_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let samples = test_samples(100, 4);
    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    // 50 complex samples per frame: framesize 8192 + 200 data bytes
    let offset0 = writer.payload_offset() as i64;
    let offset1 = offset0 + 8192 + 200;
    writer.add_cue_entry(CueEntry {
        timestamp: Timespec::new(0, 0),
        offset: offset0,
        streamnum: 0,
    });
    writer.write_data_frame(0, 0, &samples[..100])?;
    writer.add_cue_entry(CueEntry {
        timestamp: Timespec::new(0, 50_000_000),
        offset: offset1,
        streamnum: 0,
    });
    writer.write_data_frame(0, 1, &samples[100..])?;
    writer.close()?;

    let mut file = IqxFile::open(&path)?;
    assert_eq!(file.stream_no_of_frames(0)?, 2);
    assert_eq!(file.stream_no_of_samples(0)?, 100);

    // lookup: last entry with timestamp <= t
    let cue = file.cue_entry(0, Timespec::new(0, 60_000_000))?;
    assert_eq!(cue.offset, offset1);
    let cue = file.cue_entry(0, Timespec::new(0, 50_000_000))?;
    assert_eq!(cue.offset, offset1);
    let cue = file.cue_entry(0, Timespec::new(0, 10_000_000))?;
    assert_eq!(cue.offset, offset0);

    // next: entry after the frame containing t
    let next = file.next_cue_entry(0, Timespec::new(0, 10_000_000))?;
    assert_eq!(next.offset, offset1);
    assert!(file
        .next_cue_entry(0, Timespec::new(0, 60_000_000))
        .is_err());

    // reads go through the stored index
    assert_eq!(file.read_window(0, 50, 25)?, samples[100..150]);
    Ok(())
}

#[test]
fn test_reconstructed_cues_monotonic() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    for seq in 0..5 {
        writer.write_data_frame(0, seq, &test_samples(20, seq as i32))?;
    }
    writer.close()?;

    // no cue frame was stored: the index is rebuilt from the payload
    let file = IqxFile::open(&path)?;
    assert_eq!(file.stream_no_of_frames(0)?, 5);
    assert_eq!(file.stream_no_of_samples(0)?, 100);
    let mut last = -1.0;
    for k in 0..5 {
        let cue = file.cue_entry(0, Timespec::new(0, k * 20_000_000))?;
        let t = cue.timestamp.as_secs_f64();
        assert!(t > last);
        last = t;
    }
    Ok(())
}

#[test]
fn test_12bit_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let samples = test_samples_12bit(100, 5);
    let mut packed = vec![0u8; iqx_rs::digiq::packed_len(samples.len())?];
    iqx_rs::digiq::pack_16_to_12(&samples, &mut packed)?;

    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq12_params(1000.0))
        .create(&path)?;
    writer.write_packed_data_frame(0, 0, &packed)?;
    writer.close()?;

    let mut file = IqxFile::open(&path)?;
    assert_eq!(file.stream_type(0)?, iqx_rs::StreamType::Iq12);
    assert_eq!(file.stream_no_of_samples(0)?, 100);
    assert_relative_eq!(file.duration().as_secs_f64(), 0.1, max_relative = 1e-9);
    // 3 bytes per sample scaled by the DIGIQ word slack
    assert_relative_eq!(
        file.iq_stream_data_rate(0)?,
        1000.0 * 3.0 * 256.0 / 240.0,
        max_relative = 1e-12
    );

    // full window and a window not aligned to DIGIQ words
    assert_eq!(file.read_window(0, 0, 100)?, samples);
    assert_eq!(file.read_window(0, 7, 11)?, samples[14..36]);
    Ok(())
}

#[test]
fn test_metadata_tables_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    writer.write_data_frame(0, 0, &test_samples(50, 6))?;
    writer.set_bookmarks(vec![Bookmark {
        name: "burst".to_owned(),
        timestamp: Timespec::new(0, 25_000_000),
    }]);
    writer.add_trigger_entry(TriggerEntry {
        timestamp: Timespec::new(0, 10_000_000),
        hw_timestamp: 42,
        intersample_offset: 3,
        trigger_type: 1,
        streamnum: 0,
    });
    writer.add_trigger_entry(TriggerEntry {
        timestamp: Timespec::new(0, 20_000_000),
        trigger_type: 4,
        streamnum: -1,
        ..Default::default()
    });
    writer.add_overrun_entry(OverrunEntry {
        timestamp: Timespec::new(0, 30_000_000),
        overrun_type: 1,
        streamnum: 0,
        ..Default::default()
    });
    writer.close()?;

    let file = IqxFile::open(&path)?;
    assert_eq!(file.bookmarks().len(), 1);
    assert_eq!(file.bookmarks()[0].name, "burst");
    assert_eq!(file.bookmarks()[0].timestamp, Timespec::new(0, 25_000_000));

    assert_eq!(file.all_triggers().len(), 2);
    let stream_triggers = file.triggers(0);
    assert_eq!(stream_triggers.len(), 1);
    assert_eq!(stream_triggers[0].hw_timestamp, 42);
    assert_eq!(stream_triggers[0].intersample_offset, 3);

    assert!(file.has_overrun());
    assert_eq!(file.overruns().len(), 1);
    assert_eq!(file.overruns()[0].overrun_type, 1);
    Ok(())
}

#[test]
fn test_gps_stream_and_permissions() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let params = IqStreamParameters {
        export_permission: ExportPermission::Allowed,
        export_permission_valid: true,
        ..iq16_params(1000.0)
    };
    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", params)
        .gps_stream("gps0", 1)
        .create(&path)?;
    writer.write_data_frame(0, 0, &test_samples(50, 7))?;
    writer.write_geolocation_frame(
        1,
        0,
        &Geolocation {
            timestamp: Timespec::new(0, 0),
            latitude: 48.137,
            longitude: 11.575,
            altitude: 520.0,
            ..Default::default()
        },
    )?;
    writer.close()?;

    let file = IqxFile::open(&path)?;
    assert_eq!(file.number_of_streams(), 2);
    assert_eq!(file.gps_update_rate(), 1);
    assert_eq!(file.stream_type(1)?, iqx_rs::StreamType::Geolocation);
    assert_eq!(file.iq_stream_numbers(), [0]);
    assert_eq!(file.export_permission(0)?, ExportPermission::Allowed);
    Ok(())
}

#[test]
fn test_timing_conversions() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rec.iqx");

    let mut writer = IqxWriterBuilder::new("rec")
        .add_iq_stream("rf_a", iq16_params(1000.0))
        .create(&path)?;
    writer.write_data_frame(0, 0, &test_samples(100, 8))?;
    writer.close()?;

    let file = IqxFile::open(&path)?;
    let ts = file.timestamp_from_sample(0, 50)?;
    assert_eq!(ts, Timespec::new(0, 50_000_000));
    assert_eq!(file.sample_from_timestamp(0, ts)?, 50);
    Ok(())
}

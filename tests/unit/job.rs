use std::sync::Mutex;

use image::{Rgb, RgbImage};

use super::*;
use crate::media::{decode::InMemorySource, encode::InMemorySink};

fn frames(n: u8, w: u32, h: u32) -> Vec<RgbImage> {
    (0..n)
        .map(|i| RgbImage::from_pixel(w, h, Rgb([i, i, i])))
        .collect()
}

fn cfg(w: u32, h: u32) -> SinkConfig {
    SinkConfig {
        width: w,
        height: h,
        fps: Fps::new(30, 1).unwrap(),
    }
}

#[test]
fn stamp_frames_preserves_frame_count_and_order() {
    let mut source = InMemorySource::new(frames(10, 4, 4));
    let mut sink = InMemorySink::new();
    let seen = Mutex::new(Vec::new());
    let mark = |frame: &mut RgbImage, t: f64| -> StampResult<()> {
        seen.lock().unwrap().push(t);
        frame.put_pixel(3, 3, Rgb([255, 255, 255]));
        Ok(())
    };

    let n = stamp_frames(&mut source, &mut sink, &mark, cfg(4, 4)).unwrap();

    assert_eq!(n, 10);
    assert_eq!(sink.frames().len(), 10);
    assert!(sink.is_ended());
    assert_eq!(source.remaining(), 0);
    for (i, (idx, frame)) in sink.frames().iter().enumerate() {
        assert_eq!(idx.0, i as u64);
        assert_eq!(frame.get_pixel(0, 0), &Rgb([i as u8; 3]));
        assert_eq!(frame.get_pixel(3, 3), &Rgb([255, 255, 255]));
    }

    let ts = seen.into_inner().unwrap();
    assert_eq!(ts.len(), 10);
    assert_eq!(ts[0], 0.0);
    assert!((ts[9] - 0.3).abs() < 1e-12);
}

#[test]
fn stamp_frames_handles_empty_source() {
    let mut source = InMemorySource::new(Vec::new());
    let mut sink = InMemorySink::new();
    let noop = |_: &mut RgbImage, _: f64| -> StampResult<()> { Ok(()) };
    assert_eq!(stamp_frames(&mut source, &mut sink, &noop, cfg(4, 4)).unwrap(), 0);
    assert!(sink.is_ended());
}

#[test]
fn stamp_frames_stops_on_transform_error() {
    let mut source = InMemorySource::new(frames(5, 2, 2));
    let mut sink = InMemorySink::new();
    let fail_third = |_: &mut RgbImage, t: f64| -> StampResult<()> {
        if t > 0.05 {
            Err(StampError::validation("boom"))
        } else {
            Ok(())
        }
    };
    assert!(stamp_frames(&mut source, &mut sink, &fail_third, cfg(2, 2)).is_err());
    assert_eq!(sink.frames().len(), 2);
    assert!(!sink.is_ended());
}

#[test]
fn stamp_frames_rejects_size_changes() {
    let mut mixed = frames(1, 4, 4);
    mixed.push(RgbImage::new(2, 2));
    let mut source = InMemorySource::new(mixed);
    let mut sink = InMemorySink::new();
    let noop = |_: &mut RgbImage, _: f64| -> StampResult<()> { Ok(()) };
    let err = stamp_frames(&mut source, &mut sink, &noop, cfg(4, 4)).unwrap_err();
    assert!(matches!(err, StampError::Media(_)));
}

#[test]
fn temp_output_is_hidden_sibling() {
    let out = Path::new("out/day1/C0001_timestamp.MP4");
    assert_eq!(
        temp_output_path(out),
        PathBuf::from("out/day1/.C0001_timestamp.MP4.partial")
    );
}

#[test]
fn temp_guard_removes_unless_disarmed() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.partial");
    let b = dir.path().join("b.partial");
    std::fs::write(&a, b"x").unwrap();
    std::fs::write(&b, b"x").unwrap();

    drop(TempFileGuard(Some(a.clone())));
    let mut keep = TempFileGuard(Some(b.clone()));
    keep.disarm();
    drop(keep);

    assert!(!a.exists());
    assert!(b.exists());
}

#[test]
fn outcome_accessors() {
    let job = Job {
        video_path: PathBuf::from("in/A.mp4"),
        metadata_path: PathBuf::from("in/AM01.XML"),
        output_path: PathBuf::from("out/A_timestamp.MP4"),
    };
    let ok = JobOutcome::Success(JobReport {
        job: job.clone(),
        frames: 60,
        fps: Fps::new(30, 1).unwrap(),
        elapsed: Duration::from_millis(5),
    });
    let failed = JobOutcome::Failed {
        job: job.clone(),
        reason: "x".to_string(),
    };
    let skipped = JobOutcome::SkippedNoMetadata {
        video_path: PathBuf::from("in/B.mp4"),
        expected_metadata: PathBuf::from("in/BM01.XML"),
    };

    assert!(ok.is_success() && !ok.is_failed());
    assert!(failed.is_failed());
    assert!(!skipped.is_success() && !skipped.is_failed());
    assert_eq!(skipped.video_path(), Path::new("in/B.mp4"));
    assert_eq!(failed.video_path(), Path::new("in/A.mp4"));
    let JobOutcome::Success(report) = ok else {
        unreachable!()
    };
    assert!((report.duration_sec() - 2.0).abs() < 1e-12);
}

#[test]
fn corrupt_metadata_fails_without_touching_output() {
    let font = FontHandle::bundled(12.0).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let job = Job {
        video_path: dir.path().join("A.mp4"),
        metadata_path: dir.path().join("AM01.XML"),
        output_path: dir.path().join("out").join("A_timestamp.MP4"),
    };
    std::fs::write(&job.video_path, b"not really a video").unwrap();
    std::fs::write(&job.metadata_path, b"<NonRealTimeMeta").unwrap();

    let err = stamp_video(&job, &StampConfig::default(), Arc::new(font), 1).unwrap_err();
    assert!(matches!(err, StampError::Metadata(_)));
    assert!(!job.output_path.exists());
    assert!(!temp_output_path(&job.output_path).exists());
}

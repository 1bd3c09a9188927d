use std::fs;

use super::*;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"x").unwrap();
}

#[test]
fn pairs_videos_with_sidecars_recursively() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let root = input.path();
    touch(&root.join("C0002.MP4"));
    touch(&root.join("C0002M01.XML"));
    touch(&root.join("day1/C0001.mp4"));
    touch(&root.join("day1/C0001M01.XML"));
    touch(&root.join("day1/notes.txt"));
    touch(&root.join("day1/C0003.mov"));

    let cfg = StampConfig::default();
    let found = discover_jobs(root, output.path(), &cfg).unwrap();

    assert!(found.skipped.is_empty());
    assert_eq!(found.jobs.len(), 2);
    let canon = root.canonicalize().unwrap();
    assert_eq!(found.jobs[0].video_path, canon.join("C0002.MP4"));
    assert_eq!(found.jobs[0].metadata_path, canon.join("C0002M01.XML"));
    assert_eq!(
        found.jobs[0].output_path,
        output.path().join("C0002_timestamp.MP4")
    );
    assert_eq!(found.jobs[1].video_path, canon.join("day1/C0001.mp4"));
    assert_eq!(
        found.jobs[1].output_path,
        output.path().join("day1").join("C0001_timestamp.MP4")
    );
}

#[test]
fn missing_sidecar_is_a_skip() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("A.mp4"));
    touch(&input.path().join("B.mp4"));
    touch(&input.path().join("BM01.XML"));

    let found = discover_jobs(input.path(), output.path(), &StampConfig::default()).unwrap();

    assert_eq!(found.jobs.len(), 1);
    assert_eq!(found.total(), 2);
    let canon = input.path().canonicalize().unwrap();
    assert_eq!(
        found.skipped,
        vec![JobOutcome::SkippedNoMetadata {
            video_path: canon.join("A.mp4"),
            expected_metadata: canon.join("AM01.XML"),
        }]
    );
}

#[test]
fn nested_output_tree_is_not_rediscovered() {
    let input = tempfile::tempdir().unwrap();
    let root = input.path();
    touch(&root.join("A.mp4"));
    touch(&root.join("AM01.XML"));
    let out = root.join("stamped");
    touch(&out.join("A_timestamp.MP4"));
    touch(&out.join("A_timestampM01.XML"));

    let first = discover_jobs(root, &out, &StampConfig::default()).unwrap();
    let second = discover_jobs(root, &out, &StampConfig::default()).unwrap();

    assert_eq!(first.jobs.len(), 1);
    assert_eq!(first, second);
}

#[test]
fn extension_list_is_configurable() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    touch(&input.path().join("A.MOV"));
    touch(&input.path().join("AM01.XML"));
    touch(&input.path().join("B.mp4"));
    touch(&input.path().join("BM01.XML"));

    let cfg = StampConfig {
        video_extensions: vec![".mov".to_string()],
        ..StampConfig::default()
    };
    let found = discover_jobs(input.path(), output.path(), &cfg).unwrap();
    assert_eq!(found.jobs.len(), 1);
    assert!(found.jobs[0].video_path.ends_with("A.MOV"));
}

#[test]
fn missing_input_root_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let err = discover_jobs(&dir.path().join("nope"), dir.path(), &StampConfig::default())
        .unwrap_err();
    assert!(matches!(err, StampError::Validation(_)));
}

#[test]
fn output_path_honors_suffix_and_extension() {
    let cfg = StampConfig {
        output_suffix: "_ts".to_string(),
        output_extension: ".mp4".to_string(),
        ..StampConfig::default()
    };
    assert_eq!(
        output_path_for(Path::new("out"), Path::new("a/b"), "C0001", &cfg),
        PathBuf::from("out/a/b/C0001_ts.mp4")
    );
}

#[test]
fn output_root_equal_to_input_root_still_discovers() {
    let input = tempfile::tempdir().unwrap();
    touch(&input.path().join("A.mp4"));
    touch(&input.path().join("AM01.XML"));

    let found = discover_jobs(input.path(), input.path(), &StampConfig::default()).unwrap();

    assert_eq!(found.jobs.len(), 1);
    assert_eq!(
        found.jobs[0].output_path,
        input.path().join("A_timestamp.MP4")
    );
}

#[test]
fn output_root_containing_input_root_still_discovers() {
    let base = tempfile::tempdir().unwrap();
    let videos = base.path().join("videos");
    touch(&videos.join("A.mp4"));
    touch(&videos.join("AM01.XML"));

    let found = discover_jobs(&videos, base.path(), &StampConfig::default()).unwrap();

    assert_eq!(found.jobs.len(), 1);
    assert!(found.skipped.is_empty());
    assert_eq!(
        found.jobs[0].output_path,
        base.path().join("A_timestamp.MP4")
    );
}

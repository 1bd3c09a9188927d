use super::*;

#[test]
fn defaults_match_recorder_layout() {
    let cfg = StampConfig::default();
    assert_eq!(cfg.font_size, 110.0);
    assert_eq!(cfg.margin, 100);
    assert_eq!(cfg.text_color, [255, 255, 255]);
    assert_eq!(cfg.metadata_suffix, "M01.XML");
    assert_eq!(cfg.output_suffix, "_timestamp");
    assert_eq!(cfg.output_extension, "MP4");
    assert_eq!(cfg.video_codec, "libx264");
    assert_eq!(cfg.audio_codec, "aac");
    assert_eq!(cfg.encoder_preset, "medium");
    assert_eq!(cfg.encoder_threads, 4);
    assert_eq!(cfg.workers, None);
    cfg.validate().unwrap();
}

#[test]
fn partial_json_keeps_defaults() {
    let cfg: StampConfig =
        serde_json::from_str(r#"{ "margin": 20, "workers": 2, "font_size": 48 }"#).unwrap();
    assert_eq!(cfg.margin, 20);
    assert_eq!(cfg.workers, Some(2));
    assert_eq!(cfg.font_size, 48.0);
    assert_eq!(cfg.video_codec, "libx264");
}

#[test]
fn unknown_fields_are_rejected() {
    assert!(serde_json::from_str::<StampConfig>(r#"{ "margn": 20 }"#).is_err());
}

#[test]
fn from_path_reads_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, r#"{ "encoder_preset": "fast" }"#).unwrap();
    assert_eq!(StampConfig::from_path(&path).unwrap().encoder_preset, "fast");

    std::fs::write(&path, r#"{ "encoder_threads": 0 }"#).unwrap();
    assert!(matches!(
        StampConfig::from_path(&path),
        Err(StampError::Validation(_))
    ));

    assert!(StampConfig::from_path(&dir.path().join("missing.json")).is_err());
}

#[test]
fn validate_catches_bad_values() {
    let bad = [
        StampConfig {
            font_size: 0.0,
            ..StampConfig::default()
        },
        StampConfig {
            font_size: f32::NAN,
            ..StampConfig::default()
        },
        StampConfig {
            video_extensions: vec![],
            ..StampConfig::default()
        },
        StampConfig {
            video_codec: " ".to_string(),
            ..StampConfig::default()
        },
        StampConfig {
            workers: Some(0),
            ..StampConfig::default()
        },
        StampConfig {
            timestamp_format: String::new(),
            ..StampConfig::default()
        },
    ];
    for cfg in bad {
        assert!(cfg.validate().is_err(), "{cfg:?}");
    }
}

#[test]
fn video_extension_match_is_case_insensitive() {
    let cfg = StampConfig {
        video_extensions: vec!["mp4".to_string(), ".MOV".to_string()],
        ..StampConfig::default()
    };
    assert!(cfg.is_video_extension("MP4"));
    assert!(cfg.is_video_extension("mov"));
    assert!(!cfg.is_video_extension("xml"));
}

#[test]
fn auto_budget_divides_cores_by_encoder_threads() {
    let cfg = StampConfig::default();
    let b = ResourceBudget::resolve(&cfg, 16).unwrap();
    assert_eq!(b.workers, 4);
    assert_eq!(b.encoder_threads, 4);
    assert!(b.total_threads() <= 16);

    let b = ResourceBudget::resolve(&cfg, 6).unwrap();
    assert_eq!(b.workers, 1);
    assert!(b.total_threads() <= 6);
}

#[test]
fn auto_budget_clamps_threads_on_small_hosts() {
    let b = ResourceBudget::resolve(&StampConfig::default(), 2).unwrap();
    assert_eq!(b.workers, 1);
    assert_eq!(b.encoder_threads, 2);

    let b = ResourceBudget::resolve(&StampConfig::default(), 0).unwrap();
    assert_eq!(b.total_threads(), 1);
}

#[test]
fn explicit_workers_must_fit_core_budget() {
    let cfg = StampConfig {
        workers: Some(3),
        encoder_threads: 4,
        ..StampConfig::default()
    };
    assert!(ResourceBudget::resolve(&cfg, 8).is_err());
    assert_eq!(
        ResourceBudget::resolve(&cfg, 12).unwrap(),
        ResourceBudget {
            workers: 3,
            encoder_threads: 4
        }
    );
}

use super::*;

fn font(size: f32) -> FontHandle {
    FontHandle::bundled(size).unwrap()
}

#[test]
fn rejects_non_positive_size() {
    assert!(matches!(
        FontHandle::load(Path::new("x.ttf"), 0.0),
        Err(StampError::Validation(_))
    ));
    assert!(FontHandle::load(Path::new("x.ttf"), f32::NAN).is_err());
}

#[test]
fn from_bytes_rejects_garbage() {
    let err = FontHandle::from_bytes(
        b"not a font".to_vec(),
        0,
        32.0,
        FontSource::File(PathBuf::from("junk.ttf")),
    )
    .unwrap_err();
    assert!(matches!(err, StampError::Font(_)));
    assert!(err.to_string().contains("junk.ttf"));
}

#[test]
fn missing_font_falls_back_to_bundled_face() {
    let font = FontHandle::load(Path::new("vidstamp-test-no-such-font.ttf"), 40.0).unwrap();
    assert_eq!(font.source(), &FontSource::Bundled);
    assert_eq!(font.size(), 40.0);
}

#[test]
fn font_file_on_disk_is_used_directly() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mono.ttf");
    std::fs::write(&path, BUNDLED_FONT).unwrap();
    let font = FontHandle::load(&path, 20.0).unwrap();
    assert_eq!(font.source(), &FontSource::File(path));
    assert_eq!(font.measure("10:00"), FontHandle::bundled(20.0).unwrap().measure("10:00"));
}

#[test]
fn measure_grows_with_text_and_size() {
    let small = font(24.0);
    let large = font(96.0);

    let a = small.measure("2024-03-01 10:00:00");
    let b = large.measure("2024-03-01 10:00:00");
    assert!(!a.is_empty());
    assert!(b.width > a.width);
    assert!(b.height > a.height);

    let shorter = small.measure("10:00");
    assert!(shorter.width < a.width);
    assert!(small.measure("").is_empty());
    assert!(small.measure("   ").is_empty());
}

#[test]
fn draw_only_touches_measured_box() {
    let font = font(32.0);
    let text = "2024-03-01 10:01:05";
    let bounds = font.measure(text);
    let (w, h) = (bounds.width + 40, bounds.height + 40);
    let base = RgbImage::from_pixel(w, h, Rgb([10, 20, 30]));
    let mut frame = base.clone();

    font.draw(&mut frame, text, 20, 20, Rgb([255, 255, 255]));

    let mut changed = 0usize;
    for (x, y, px) in frame.enumerate_pixels() {
        let inside = x >= 20 && y >= 20 && x < 20 + bounds.width && y < 20 + bounds.height;
        if inside {
            if px != base.get_pixel(x, y) {
                changed += 1;
            }
        } else {
            assert_eq!(px, base.get_pixel(x, y), "pixel ({x},{y}) outside text box changed");
        }
    }
    assert!(changed > 0);
    assert!(frame.pixels().any(|p| p.0.iter().all(|c| *c >= 250)));
}

#[test]
fn draw_clips_at_frame_edges() {
    let font = font(48.0);
    let mut frame = RgbImage::new(16, 16);
    font.draw(&mut frame, "88:88", -30, -30, Rgb([255, 255, 255]));
    font.draw(&mut frame, "88:88", 10, 10, Rgb([255, 255, 255]));
    assert_eq!(frame.dimensions(), (16, 16));
}

#[test]
fn unreadable_font_file_falls_back_to_bundled_face() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"definitely not a font").unwrap();
    let font = FontHandle::load(&path, 24.0).unwrap();
    assert_eq!(font.source(), &FontSource::Bundled);
    assert!(!font.measure("2024-03-01 10:00:00").is_empty());
}

use anyhow::Result;
use image::{Rgba, RgbaImage};

use artvertiser::catalog::OverlaySelector;
use artvertiser::composite::{CompositorConfig, OverlayTexture};
use artvertiser::roi::roi_path;
use artvertiser::{Compositor, Mat3x4, OverlayCatalog, Point2, Roi};

fn overlay_dir() -> Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    for i in 1..=5u8 {
        RgbaImage::from_pixel(4, 4, Rgba([i, 0, 0, 255]))
            .save(dir.path().join(format!("artvert{}.png", i)))?;
    }
    Ok(dir)
}

#[test]
fn cycling_the_default_catalog_returns_to_the_first_asset() -> Result<()> {
    let dir = overlay_dir()?;
    let catalog = OverlayCatalog::default_set(dir.path())?;
    let mut selector = OverlaySelector::new(catalog.len())?;
    let mut titles = Vec::new();
    for _ in 0..catalog.len() {
        selector.next();
        titles.push(catalog.selected(&selector).unwrap().metadata.title.clone());
    }
    assert_eq!(selector.index(), 0);
    assert_eq!(titles.last().map(String::as_str), Some("Arrebato, 1980"));
    Ok(())
}

#[test]
fn roi_file_next_to_model_drives_the_quad_and_label() -> Result<()> {
    let dir = overlay_dir()?;
    let model = dir.path().join("model.bmp");
    std::fs::write(roi_path(&model), "20,30\n220,30\n220,150\n20,150\n")?;
    let roi = Roi::load(&roi_path(&model))?;

    let catalog = OverlayCatalog::default_set(dir.path())?;
    let mut compositor = Compositor::new(
        CompositorConfig::default(),
        OverlaySelector::new(catalog.len())?,
    );
    compositor.selector_mut().select(1)?;
    compositor.set_label_visible(true);

    let pose = Mat3x4::identity();
    let params = compositor
        .compose(Some(&pose), &roi, &catalog, (240, 180))
        .expect("overlay");
    assert_eq!(params.quad, roi.points());
    assert_eq!(params.quad[0], Point2::new(20.0, 30.0));
    match params.texture {
        OverlayTexture::Image(image) => assert_eq!(image.get_pixel(0, 0).0, [2, 0, 0, 255]),
        OverlayTexture::VideoFrame(_) => panic!("video playback is off"),
    }
    let label = params.label.expect("label visible");
    assert_eq!(
        label.lines,
        ["name2", "2008", "simon innings", "Helmut Lang", "Parlance Avenue"]
    );
    assert_eq!(label.border[1], Point2::new(230.0, 20.0));
    assert_eq!(label.anchor, Point2::new(232.0, 30.0));
    Ok(())
}

#[test]
fn missing_roi_file_still_composes_an_empty_quad() -> Result<()> {
    let dir = overlay_dir()?;
    let roi = Roi::load(&roi_path(&dir.path().join("absent.bmp")))?;
    let catalog = OverlayCatalog::default_set(dir.path())?;
    let mut compositor = Compositor::new(
        CompositorConfig::default(),
        OverlaySelector::new(catalog.len())?,
    );
    compositor.set_label_visible(true);
    let params = compositor
        .compose(Some(&Mat3x4::identity()), &roi, &catalog, (240, 180))
        .expect("overlay");
    assert!(params.quad.is_empty());
    assert!(params.label.is_none());
    Ok(())
}

use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use artvertiser::config::ArtvertiserConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ARTVERT_CONFIG",
        "ARTVERT_MODEL",
        "ARTVERT_CAPTURE_URL",
        "ARTVERT_CAMERAS",
        "ARTVERT_MOTION_THRESHOLD",
        "ARTVERT_OBSERVATION_THRESHOLD",
        "ARTVERT_CALIB_CACHE",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ArtvertiserConfig::load().expect("load config");
    assert_eq!(cfg.model_path, PathBuf::from("model.bmp"));
    assert_eq!(cfg.capture.url, "stub://camera");
    assert_eq!(cfg.capture.cameras, 1);
    assert_eq!((cfg.capture.width, cfg.capture.height), (320, 240));
    assert_eq!(cfg.capture.target_fps, 30);
    assert_eq!(cfg.calibration.observation_threshold, 150);
    assert!(cfg.calibration.use_cache);
    assert_eq!(cfg.calibration.intrinsics_path, PathBuf::from("camera_c.json"));
    assert_eq!(cfg.calibration.extrinsics_path, PathBuf::from("camera_r_t.json"));
    assert_eq!(cfg.stabilizer.intensity_delta, 30);
    assert_eq!(cfg.stabilizer.motion_threshold, 10_000);
    assert_eq!(cfg.compositor.fade_step, 0.2);
    assert_eq!(cfg.overlay_video_size(), (160, 120));

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "model": "billboard.png",
            "capture": {
                "url": "frames/",
                "cameras": 2,
                "width": 640,
                "height": 480,
                "target_fps": 15
            },
            "calibration": {
                "observation_threshold": 60,
                "use_cache": true,
                "intrinsics_path": "rig_c.json"
            },
            "stabilizer": {
                "intensity_delta": 20,
                "motion_threshold": 4000
            },
            "compositor": {
                "fade_step": 0.5,
                "label_margin": 6
            },
            "overlays": {
                "manifest": "overlays.json",
                "video": "clips/",
                "video_scale": 0.25
            }
        }"#,
    );

    std::env::set_var("ARTVERT_CONFIG", file.path());
    std::env::set_var("ARTVERT_CAPTURE_URL", "stub://rig");
    std::env::set_var("ARTVERT_MOTION_THRESHOLD", "12000");
    std::env::set_var("ARTVERT_CALIB_CACHE", "off");

    let cfg = ArtvertiserConfig::load().expect("load config");

    assert_eq!(cfg.model_path, PathBuf::from("billboard.png"));
    assert_eq!(cfg.capture.url, "stub://rig");
    assert_eq!(cfg.capture.cameras, 2);
    assert_eq!(cfg.capture.target_fps, 15);
    assert_eq!(cfg.calibration.observation_threshold, 60);
    assert!(!cfg.calibration.use_cache);
    assert_eq!(cfg.calibration.intrinsics_path, PathBuf::from("rig_c.json"));
    assert_eq!(cfg.calibration.extrinsics_path, PathBuf::from("camera_r_t.json"));
    assert_eq!(cfg.stabilizer.intensity_delta, 20);
    assert_eq!(cfg.stabilizer.motion_threshold, 12_000);
    assert_eq!(cfg.compositor.fade_step, 0.5);
    assert_eq!(cfg.compositor.label_margin, 6.0);
    assert_eq!(cfg.overlays.manifest, Some(PathBuf::from("overlays.json")));
    assert_eq!(cfg.overlay_video_size(), (160, 120));

    let capture = cfg.capture_config();
    assert_eq!(capture.cameras, 2);
    let video = cfg.overlay_video_config().expect("overlay video");
    assert_eq!(video.url, "clips/");
    assert_eq!(video.cameras, 1);
    assert_eq!((video.width, video.height), (160, 120));

    let session = cfg.session_config((800, 600));
    assert_eq!(session.observation_threshold, 60);
    assert!(!session.use_cache);
    assert_eq!(session.model_size, (800, 600));

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("ARTVERT_CAMERAS", "0");
    assert!(ArtvertiserConfig::load().is_err());
    clear_env();

    std::env::set_var("ARTVERT_OBSERVATION_THRESHOLD", "0");
    assert!(ArtvertiserConfig::load().is_err());
    clear_env();

    std::env::set_var("ARTVERT_MOTION_THRESHOLD", "lots");
    assert!(ArtvertiserConfig::load().is_err());
    clear_env();

    std::env::set_var("ARTVERT_CALIB_CACHE", "sometimes");
    assert!(ArtvertiserConfig::load().is_err());
    clear_env();

    let file = write_config(r#"{"compositor": {"fade_step": 1.5}}"#);
    std::env::set_var("ARTVERT_CONFIG", file.path());
    assert!(ArtvertiserConfig::load().is_err());
    clear_env();

    let file = write_config(r#"{"capture": {"width": 0}}"#);
    std::env::set_var("ARTVERT_CONFIG", file.path());
    assert!(ArtvertiserConfig::load().is_err());
    clear_env();

    std::env::set_var("ARTVERT_CONFIG", "/nonexistent/artvertiser.json");
    assert!(ArtvertiserConfig::load().is_err());

    clear_env();
}

use std::time::Duration;

pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

/// Fixed models directory, relative to the working directory.
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Storage key holding the most recent recorded clip.
pub const RECORDED_VIDEO_KEY: &str = "recordedVideo";

/// Lifetime of a toast notification.
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

/// How long shutdown waits for an in-flight clip to be persisted.
pub const FINALIZE_GRACE: Duration = Duration::from_secs(5);

pub const DEFAULT_REFRESH_HZ: u32 = 60;

pub const DEFAULT_CAMERA_WIDTH: u32 = 640;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 480;

pub const MSG_VIDEO_SAVED: &str = "Video saved to local storage!";
pub const MSG_NO_SAVED_VIDEO: &str = "No saved video found.";

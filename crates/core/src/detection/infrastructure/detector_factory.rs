use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::domain::face_detector::{DetectorOptions, DetectorVariant, FaceDetector};
use crate::shared::constants::{BLAZEFACE_MODEL_NAME, YOLO_MODEL_NAME, YOLO_MODEL_URL};

use super::model_resolver::{self, ModelResolveError, ProgressFn};
use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::onnx_yolo_detector::OnnxYoloDetector;

/// Detection assets could not be turned into a working detector.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("face model {name} is missing: {source}")]
    Missing {
        name: String,
        #[source]
        source: ModelResolveError,
    },
    #[error("face model at {path} is malformed: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Where detector assets come from.
#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub models_dir: PathBuf,
    /// Fetch missing models into the user cache.
    pub allow_download: bool,
}

impl ModelAssets {
    pub fn new(models_dir: impl Into<PathBuf>, allow_download: bool) -> Self {
        Self {
            models_dir: models_dir.into(),
            allow_download,
        }
    }
}

/// File name and optional download location for a detector variant.
pub fn model_for(variant: DetectorVariant) -> (&'static str, Option<&'static str>) {
    match variant {
        DetectorVariant::Yolo => (YOLO_MODEL_NAME, Some(YOLO_MODEL_URL)),
        DetectorVariant::Blazeface => (BLAZEFACE_MODEL_NAME, None),
    }
}

/// Resolves the model for `options.variant` and opens an inference session.
pub fn load_detector(
    options: &DetectorOptions,
    assets: &ModelAssets,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn FaceDetector>, ModelLoadError> {
    let (name, url) = model_for(options.variant);
    let url = url.filter(|_| assets.allow_download);

    log::info!("Loading {} face model: {name}", options.variant);
    let path = model_resolver::resolve(name, &assets.models_dir, url, progress).map_err(
        |source| ModelLoadError::Missing {
            name: name.to_string(),
            source,
        },
    )?;

    open_detector(options, &path)
}

fn open_detector(
    options: &DetectorOptions,
    path: &Path,
) -> Result<Box<dyn FaceDetector>, ModelLoadError> {
    let malformed = |e: Box<dyn std::error::Error>| ModelLoadError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    match options.variant {
        DetectorVariant::Yolo => Ok(Box::new(OnnxYoloDetector::new(path, options).map_err(malformed)?)),
        DetectorVariant::Blazeface => Ok(Box::new(
            OnnxBlazefaceDetector::new(path, options).map_err(malformed)?,
        )),
    }
}

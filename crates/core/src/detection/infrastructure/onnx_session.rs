use std::path::Path;

use ort::session::Session;

/// Opens an ONNX model with the platform's preferred execution providers.
///
/// CoreML on macOS, DirectML on Windows, CPU elsewhere. ONNX Runtime falls
/// back to CPU when a registered provider cannot be initialized.
pub fn open_session(model_path: &Path) -> Result<Session, ort::Error> {
    let session = Session::builder()?
        .with_execution_providers(execution_providers())?
        .commit_from_file(model_path)?;
    log::debug!(
        "Opened ONNX session for {} ({} inputs, {} outputs)",
        model_path.display(),
        session.inputs().len(),
        session.outputs().len()
    );
    Ok(session)
}

fn execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

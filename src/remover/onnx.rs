// ONNX Runtime implementation of `BackgroundRemover`.

use super::{
    BackgroundRemover, RemovalError,
    u2net::{self, ModelKind},
};
use ort::{
    session::{Session, builder::GraphOptimizationLevel},
    value::Tensor,
};
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::Instant,
};
use tracing::{debug, info};

/// A segmentation model loaded once at startup and reused for every request.
#[derive(Debug)]
pub struct OnnxRemover {
    // `Session::run` takes `&mut self`, so concurrent requests are serialized here.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    kind: ModelKind,
}

impl OnnxRemover {
    /// Loads the model at `model_path` and commits an inference session for it.
    ///
    /// `intra_threads == 0` lets the runtime use every available core.
    pub fn load(
        model_path: &Path,
        kind: ModelKind,
        intra_threads: usize,
    ) -> Result<Self, RemovalError> {
        let load_error = |details: String| RemovalError::ModelLoad {
            path: PathBuf::from(model_path),
            details,
        };

        if !model_path.is_file() {
            return Err(load_error("model file does not exist".to_string()));
        }

        let intra_threads = if intra_threads > 0 {
            intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let started = Instant::now();
        let session = Session::builder()
            .map_err(|e| load_error(format!("failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_error(format!("failed to set optimization level: {}", e)))?
            .with_intra_threads(intra_threads)
            .map_err(|e| load_error(format!("failed to set intra threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| load_error(format!("failed to commit session: {}", e)))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| load_error("model declares no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| load_error("model declares no outputs".to_string()))?;

        info!(
            "Loaded {:?} model from {} in {} ms ({} intra-op threads, input '{}', output '{}')",
            kind,
            model_path.display(),
            started.elapsed().as_millis(),
            intra_threads,
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            kind,
        })
    }
}

impl BackgroundRemover for OnnxRemover {
    fn remove_background(&self, image: &[u8]) -> Result<Vec<u8>, RemovalError> {
        let started = Instant::now();

        let decoded = image::load_from_memory(image).map_err(RemovalError::Decode)?;
        let (width, height) = (decoded.width(), decoded.height());
        let input = Tensor::from_array(u2net::preprocess(&decoded, self.kind))?;

        let prediction = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| RemovalError::SessionPoisoned)?;
            let outputs = session.run(ort::inputs![self.input_name.as_str() => &input])?;
            let prediction = outputs[self.output_name.as_str()]
                .try_extract_array::<f32>()?
                .into_owned();
            prediction
        };
        debug!(
            "Inference on {}x{} image took {} ms",
            width,
            height,
            started.elapsed().as_millis()
        );

        let mask = u2net::mask_from_prediction(prediction, width, height)?;
        let cutout = u2net::apply_mask(&decoded, &mask);
        u2net::encode_png(cutout)
    }
}

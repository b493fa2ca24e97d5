use std::path::Path;

use tract_onnx::prelude::*;

use crate::backend::{BackendError, ModelLoader, ModelSession, TensorData, TensorMap};
use crate::types::GridShape;

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Loads `.onnx` models with tract, pinning the input to the grid shape.
#[derive(Clone, Copy, Debug, Default)]
pub struct OnnxLoader;

impl ModelLoader for OnnxLoader {
    fn load(&self, path: &Path, shape: GridShape) -> Result<Box<dyn ModelSession>, BackendError> {
        let session = OnnxSession::open(path, shape).map_err(|err| BackendError::Load {
            path: path.to_path_buf(),
            reason: format!("{err:#}"),
        })?;
        Ok(Box::new(session))
    }
}

pub struct OnnxSession {
    plan: Plan,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OnnxSession {
    fn open(path: &Path, shape: GridShape) -> TractResult<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(0, f32::fact(shape.dims()).into())?
            .into_optimized()?;

        let input_names = model
            .input_outlets()?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();
        let output_names = model
            .output_outlets()?
            .iter()
            .map(|outlet| model.node(outlet.node).name.clone())
            .collect();

        Ok(Self {
            plan: model.into_runnable()?,
            input_names,
            output_names,
        })
    }

    fn run_plan(&self, input: &TensorData) -> TractResult<Option<TensorData>> {
        let tensor = Tensor::from_shape(&input.dims, &input.data)?;
        let outputs = self.plan.run(tvec!(tensor.into()))?;
        let Some(output) = outputs.first() else {
            return Ok(None);
        };
        Ok(Some(TensorData::new(
            output.shape().to_vec(),
            output.as_slice::<f32>()?.to_vec(),
        )))
    }
}

impl ModelSession for OnnxSession {
    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&mut self, mut feeds: TensorMap) -> Result<TensorMap, BackendError> {
        let input_name = self
            .input_names
            .first()
            .ok_or(BackendError::NoTensors("input"))?;
        let output_name = self
            .output_names
            .first()
            .ok_or(BackendError::NoTensors("output"))?;
        let input = feeds
            .remove(input_name)
            .ok_or_else(|| BackendError::Inference(format!("no feed named {input_name:?}")))?;

        let output = self
            .run_plan(&input)
            .map_err(|err| BackendError::Inference(format!("{err:#}")))?
            .ok_or_else(|| BackendError::MissingOutput(output_name.clone()))?;

        let mut results = TensorMap::new();
        results.insert(output_name.clone(), output);
        Ok(results)
    }
}

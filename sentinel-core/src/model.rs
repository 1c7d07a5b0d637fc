use std::{fmt::Write, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::{
    Datum, Framework, Graph, InferenceFact, InferenceModelExt, IntoTensor, SimplePlan, Tensor,
    TypedFact, TypedOp, tvec,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A runnable ONNX graph with a single input.
///
/// Shared by the gender and station classifiers. Loading first attempts a fully
/// optimized plan and falls back to the decluttered graph when an operator cannot
/// be optimized.
#[derive(Debug)]
pub struct OnnxModel {
    runnable: RunnableModel,
    name: String,
}

impl OnnxModel {
    /// Load an ONNX graph, optionally pinning the `f32` input shape.
    ///
    /// `name` only appears in logs and error messages.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        input_shape: Option<&[usize]>,
        name: &str,
    ) -> Result<Self> {
        let path = model_path.as_ref();
        anyhow::ensure!(path.exists(), "{name} model not found: {}", path.display());

        let runnable = match load_runnable_model(path, input_shape, true) {
            Ok(model) => {
                debug!("{name} model {} optimized successfully", path.display());
                model
            }
            Err(opt_err) => {
                let optimize_msg = format!("{opt_err}");
                let mut chain_msg = String::new();
                for cause in opt_err.chain() {
                    let _ = writeln!(&mut chain_msg, "  - {cause}");
                }
                warn!(
                    "{name} model {} failed optimized load ({}); falling back to decluttered graph.\nError chain:\n{}",
                    path.display(),
                    optimize_msg,
                    chain_msg.trim_end()
                );
                let decluttered =
                    load_runnable_model(path, input_shape, false).with_context(|| {
                        format!(
                            "fallback to decluttered {name} graph failed after optimize error: {optimize_msg}"
                        )
                    })?;
                debug!("{name} model {} running in decluttered mode", path.display());
                decluttered
            }
        };

        Ok(Self {
            runnable,
            name: name.to_string(),
        })
    }

    /// Execute the graph and return every output tensor in declaration order.
    pub fn run(&self, input: Tensor) -> Result<Vec<Tensor>> {
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("{} execution failed: {e}", self.name))?;
        let tensors: Vec<Tensor> = outputs
            .into_iter()
            .map(|value| value.into_tensor())
            .collect();
        anyhow::ensure!(!tensors.is_empty(), "{} model produced no outputs", self.name);
        Ok(tensors)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn load_runnable_model(
    path: &Path,
    input_shape: Option<&[usize]>,
    optimized: bool,
) -> Result<RunnableModel> {
    let mut model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    if let Some(shape) = input_shape {
        model = model
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), shape.to_vec()))
            .map_err(|e| anyhow::anyhow!("unable to set input shape {shape:?}: {e}"))?;
    }

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    }
}

//! Model artifacts: serialized estimator, signature and input example

use crate::data::{Dataset, FeatureTable};
use crate::error::Result;
use crate::training::{Model, ModelType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// File holding the model metadata
pub const MLMODEL_FILE: &str = "MLmodel";
/// File holding the serialized estimator
pub const MODEL_DATA_FILE: &str = "model.json";
/// File holding the input example
pub const INPUT_EXAMPLE_FILE: &str = "input_example.json";

/// One column of a model signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColSpec {
    #[serde(rename = "type")]
    pub dtype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub required: bool,
}

impl ColSpec {
    fn double(name: Option<String>) -> Self {
        Self {
            dtype: "double".to_string(),
            name,
            required: true,
        }
    }
}

/// Input and output schema of a fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub inputs: Vec<ColSpec>,
    pub outputs: Vec<ColSpec>,
}

impl ModelSignature {
    /// Infer from a training set: one input per feature column, one output named after the target
    pub fn infer(dataset: &Dataset) -> Self {
        Self {
            inputs: dataset
                .features
                .columns()
                .iter()
                .map(|c| ColSpec::double(Some(c.clone())))
                .collect(),
            outputs: vec![ColSpec::double(Some(dataset.target_name.clone()))],
        }
    }

    /// The MLmodel form, where each side is a JSON-encoded string
    pub fn to_mlmodel(&self) -> Result<Value> {
        Ok(json!({
            "inputs": serde_json::to_string(&self.inputs)?,
            "outputs": serde_json::to_string(&self.outputs)?,
        }))
    }
}

/// A fitted estimator packaged for logging
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub artifact_path: String,
    pub model_type: ModelType,
    pub params: BTreeMap<String, String>,
    pub model_bytes: Vec<u8>,
    pub input_example: Option<FeatureTable>,
    pub signature: Option<ModelSignature>,
}

impl ModelArtifact {
    /// Serialize a fitted model under `artifact_path`
    pub fn from_model(model: &dyn Model, artifact_path: impl Into<String>) -> Result<Self> {
        Ok(Self {
            artifact_path: artifact_path.into(),
            model_type: model.model_type(),
            params: model.params(),
            model_bytes: model.to_bytes()?,
            input_example: None,
            signature: None,
        })
    }

    pub fn with_input_example(mut self, example: FeatureTable) -> Self {
        self.input_example = Some(example);
        self
    }

    pub fn with_signature(mut self, signature: ModelSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Metadata document describing this artifact within `run_id`
    pub fn mlmodel(&self, run_id: &str) -> Result<Value> {
        let mut doc = json!({
            "artifact_path": self.artifact_path,
            "flavors": {
                "model_select": {
                    "model_type": self.model_type,
                    "data": MODEL_DATA_FILE,
                    "params": self.params,
                    "crate_version": env!("CARGO_PKG_VERSION"),
                }
            },
            "model_uuid": uuid::Uuid::new_v4().simple().to_string(),
            "run_id": run_id,
            "utc_time_created": chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
        });

        if self.input_example.is_some() {
            doc["saved_input_example_info"] = json!({
                "artifact_path": INPUT_EXAMPLE_FILE,
                "type": "dataframe",
                "pandas_orient": "split",
            });
        }
        if let Some(signature) = &self.signature {
            doc["signature"] = signature.to_mlmodel()?;
        }
        Ok(doc)
    }

    /// Files making up the artifact directory, as (file name, contents).
    ///
    /// `MLmodel` is written as JSON, which YAML readers also accept.
    pub fn files(&self, run_id: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut files = vec![
            (
                MLMODEL_FILE.to_string(),
                serde_json::to_vec_pretty(&self.mlmodel(run_id)?)?,
            ),
            (MODEL_DATA_FILE.to_string(), self.model_bytes.clone()),
        ];
        if let Some(example) = &self.input_example {
            files.push((
                INPUT_EXAMPLE_FILE.to_string(),
                serde_json::to_vec(&example.to_split_json())?,
            ));
        }
        Ok(files)
    }
}

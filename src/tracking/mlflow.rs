//! MLflow tracking server client
//!
//! Speaks the REST 2.0 API over blocking HTTP. Artifacts go through the
//! server's `mlflow-artifacts` proxy, or straight to disk when the run's
//! artifact root is a `file://` URI.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, SelectError};
use crate::utils::now_millis;
use super::artifact::ModelArtifact;
use super::{RunStatus, TrackingSink};

const PROXY_SCHEME: &str = "mlflow-artifacts:";

#[derive(Debug, Deserialize)]
struct ExperimentResponse {
    experiment: ExperimentInfo,
}

#[derive(Debug, Deserialize)]
struct ExperimentInfo {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateRunResponse {
    run: RunPayload,
}

#[derive(Debug, Deserialize)]
struct RunPayload {
    info: RunInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct RunInfo {
    run_id: String,
    #[serde(default)]
    artifact_uri: String,
}

/// Client for a remote MLflow tracking server
pub struct MlflowClient {
    http: HttpClient,
    base: Url,
    experiment_id: RwLock<Option<String>>,
    active_run: RwLock<Option<RunInfo>>,
}

impl MlflowClient {
    /// Create a client for the server at `tracking_uri`
    pub fn new(tracking_uri: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(tracking_uri).map_err(|e| {
            SelectError::ConfigError(format!("invalid tracking uri '{}': {}", tracking_uri, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SelectError::ConfigError(format!(
                "MLflow client needs an http(s) uri, got '{}'",
                tracking_uri
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base,
            experiment_id: RwLock::new(None),
            active_run: RwLock::new(None),
        })
    }

    /// Server root every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Identifier of the current experiment, once set
    pub fn experiment_id(&self) -> Option<String> {
        self.experiment_id.read().clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| SelectError::TrackingError(format!("bad endpoint '{}': {}", path, e)))
    }

    fn api(&self, method: &str) -> Result<Url> {
        self.endpoint(&format!("api/2.0/mlflow/{}", method))
    }

    fn post(&self, method: &str, payload: &Value) -> Result<Value> {
        let url = self.api(method)?;
        debug!(%url, "MLflow POST");
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .map_err(|e| SelectError::TrackingError(format!("{} request failed: {}", method, e)))?;
        json_or_error(method, response)
    }

    fn active_run(&self) -> Result<RunInfo> {
        self.active_run
            .read()
            .clone()
            .ok_or_else(|| SelectError::TrackingError("no active run".to_string()))
    }

    fn find_experiment(&self, name: &str) -> Result<Option<String>> {
        let mut url = self.api("experiments/get-by-name")?;
        url.query_pairs_mut().append_pair("experiment_name", name);

        let response = self
            .http
            .get(url)
            .send()
            .map_err(|e| SelectError::TrackingError(format!("experiment lookup failed: {}", e)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = json_or_error("experiments/get-by-name", response)?;
        let parsed: ExperimentResponse = serde_json::from_value(body)?;
        Ok(Some(parsed.experiment.experiment_id))
    }

    fn upload_artifact(&self, run: &RunInfo, artifact_path: &str, file_name: &str, contents: Vec<u8>) -> Result<()> {
        let root = run.artifact_uri.trim_end_matches('/');

        if let Some(local) = root.strip_prefix("file://") {
            let dir = PathBuf::from(local).join(artifact_path);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(file_name), contents)?;
            return Ok(());
        }

        let relative = root.strip_prefix(PROXY_SCHEME).ok_or_else(|| {
            SelectError::TrackingError(format!("unsupported artifact store '{}'", run.artifact_uri))
        })?;
        let url = self.endpoint(&format!(
            "api/2.0/mlflow-artifacts/artifacts/{}/{}/{}",
            relative.trim_start_matches('/'),
            artifact_path,
            file_name
        ))?;
        debug!(%url, bytes = contents.len(), "Uploading artifact");

        let response = self
            .http
            .put(url)
            .body(contents)
            .send()
            .map_err(|e| SelectError::TrackingError(format!("artifact upload failed: {}", e)))?;
        json_or_error("mlflow-artifacts", response).map(|_| ())
    }
}

impl TrackingSink for MlflowClient {
    fn set_experiment(&self, name: &str) -> Result<String> {
        let experiment_id = match self.find_experiment(name)? {
            Some(id) => id,
            None => {
                let body = self.post("experiments/create", &json!({ "name": name }))?;
                let created: CreateExperimentResponse = serde_json::from_value(body)?;
                info!(experiment = name, id = %created.experiment_id, "Created MLflow experiment");
                created.experiment_id
            }
        };

        *self.experiment_id.write() = Some(experiment_id.clone());
        Ok(experiment_id)
    }

    fn start_run(&self, run_name: &str) -> Result<String> {
        let experiment_id = self.experiment_id().ok_or_else(|| {
            SelectError::TrackingError("set an experiment before starting a run".to_string())
        })?;
        if let Some(active) = self.active_run.read().as_ref() {
            return Err(SelectError::TrackingError(format!(
                "run {} is still active",
                active.run_id
            )));
        }

        let body = self.post(
            "runs/create",
            &json!({
                "experiment_id": experiment_id,
                "run_name": run_name,
                "start_time": now_millis(),
                "tags": [{ "key": "mlflow.runName", "value": run_name }],
            }),
        )?;
        let created: CreateRunResponse = serde_json::from_value(body)?;
        let run_id = created.run.info.run_id.clone();
        *self.active_run.write() = Some(created.run.info);

        Ok(run_id)
    }

    fn log_param(&self, key: &str, value: &str) -> Result<()> {
        let run = self.active_run()?;
        self.post(
            "runs/log-parameter",
            &json!({ "run_id": run.run_id, "key": key, "value": value }),
        )
        .map(|_| ())
    }

    fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        let run = self.active_run()?;
        self.post(
            "runs/log-metric",
            &json!({
                "run_id": run.run_id,
                "key": key,
                "value": metric_value(value),
                "timestamp": now_millis(),
                "step": 0,
            }),
        )
        .map(|_| ())
    }

    fn set_tag(&self, key: &str, value: &str) -> Result<()> {
        let run = self.active_run()?;
        self.post(
            "runs/set-tag",
            &json!({ "run_id": run.run_id, "key": key, "value": value }),
        )
        .map(|_| ())
    }

    fn log_model(&self, artifact: &ModelArtifact) -> Result<()> {
        let run = self.active_run()?;

        for (file_name, contents) in artifact.files(&run.run_id)? {
            self.upload_artifact(&run, &artifact.artifact_path, &file_name, contents)?;
        }

        let model_json = serde_json::to_string(&artifact.mlmodel(&run.run_id)?)?;
        self.post(
            "runs/log-model",
            &json!({ "run_id": run.run_id, "model_json": model_json }),
        )?;
        info!(run_id = %run.run_id, artifact_path = %artifact.artifact_path, "Logged model");
        Ok(())
    }

    fn end_run(&self, status: RunStatus) -> Result<()> {
        let run = self
            .active_run
            .write()
            .take()
            .ok_or_else(|| SelectError::TrackingError("no active run to end".to_string()))?;

        self.post(
            "runs/update",
            &json!({
                "run_id": run.run_id,
                "status": status.as_str(),
                "end_time": now_millis(),
            }),
        )
        .map(|_| ())
    }
}

/// Metric values as the REST API accepts them; non-finite doubles travel as strings
fn metric_value(value: f64) -> Value {
    if value.is_nan() {
        json!("NaN")
    } else if value == f64::INFINITY {
        json!("Infinity")
    } else if value == f64::NEG_INFINITY {
        json!("-Infinity")
    } else {
        json!(value)
    }
}

fn json_or_error(method: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let text = response
        .text()
        .map_err(|e| SelectError::TrackingError(format!("{}: unreadable response: {}", method, e)))?;

    if !status.is_success() {
        return Err(SelectError::TrackingError(format!(
            "{} failed with HTTP {}: {}",
            method,
            status.as_u16(),
            text
        )));
    }
    if text.trim().is_empty() {
        return Ok(json!({}));
    }
    Ok(serde_json::from_str(&text)?)
}

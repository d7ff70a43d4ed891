use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sheetnest::config::NestingConfig;
use sheetnest::entities::{NestingProgress, Part, Sheet};
use sheetnest::optimizer::OptimizerRequest;

/// Messages sent to the background worker.
/// On the wire: `{"type": "NEST", "payload": {...}}` or `{"type": "CANCEL"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    Nest(NestRequestPayload),
    Cancel,
}

/// Messages sent back by the background worker.
/// Every job produces zero or more `Progress` followed by exactly one `Result` or `Error`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerReply {
    Ready(ReadyPayload),
    Progress(ProgressPayload),
    Result(NestResultPayload),
    Error(ErrorPayload),
}

impl WorkerReply {
    /// Whether this reply ends a job
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerReply::Result(_) | WorkerReply::Error(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestRequestPayload {
    pub sheet: Sheet,
    pub parts: Vec<Part>,
    pub config: NestingConfig,
}

impl NestRequestPayload {
    pub fn to_optimizer_request(&self) -> OptimizerRequest {
        OptimizerRequest::new(&self.parts, self.sheet, &self.config)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyPayload {
    #[serde(alias = "wasmAvailable")]
    pub advanced_available: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub iteration: u32,
    pub total_iterations: u32,
    pub current_utilization: f64,
}

impl From<NestingProgress> for ProgressPayload {
    fn from(p: NestingProgress) -> Self {
        ProgressPayload {
            iteration: p.iteration,
            total_iterations: p.total_iterations,
            current_utilization: p.utilization,
        }
    }
}

impl From<ProgressPayload> for NestingProgress {
    fn from(p: ProgressPayload) -> Self {
        NestingProgress {
            iteration: p.iteration,
            total_iterations: p.total_iterations,
            utilization: p.current_utilization,
        }
    }
}

/// A placement as reported by the worker. The rotation is in degrees and not yet validated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPlacement {
    pub part_id: String,
    pub sheet_index: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rotation: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NestResultPayload {
    pub placements: Vec<ResultPlacement>,
    pub sheets_used: u32,
    pub utilization: Vec<f64>,
    pub iterations_run: u32,
    pub algorithm: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    #[serde(alias = "WASM_LOAD_FAILED")]
    OptimizerLoadFailed,
    NestingFailed,
    Cancelled,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub code: ErrorCode,
}

impl ErrorPayload {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorPayload {
            message: message.into(),
            code,
        }
    }
}

/// Serializes a protocol message to its JSON wire form
pub fn encode<T: Serialize>(message: &T) -> Result<String> {
    serde_json::to_string(message).context("could not encode protocol message")
}

/// Parses a protocol message from its JSON wire form
pub fn decode<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).with_context(|| format!("could not decode protocol message: {json}"))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn to_value<T: Serialize>(message: &T) -> Value {
        serde_json::from_str(&encode(message).unwrap()).unwrap()
    }

    #[test]
    fn nest_request_wire_shape() {
        let request = WorkerRequest::Nest(NestRequestPayload {
            sheet: Sheet::new(3000.0, 1500.0),
            parts: vec![Part::new("p1", 100.0, 50.0, 2)],
            config: NestingConfig::default(),
        });
        assert_eq!(
            to_value(&request),
            json!({
                "type": "NEST",
                "payload": {
                    "sheet": {"width": 3000.0, "height": 1500.0},
                    "parts": [{"id": "p1", "width": 100.0, "height": 50.0, "quantity": 2}],
                    "config": {
                        "spacing": 2.0,
                        "rotationSteps": 4,
                        "iterations": 100,
                        "populationSize": 50,
                        "mutationRate": 0.1
                    }
                }
            })
        );
    }

    #[test]
    fn cancel_has_no_payload() {
        assert_eq!(to_value(&WorkerRequest::Cancel), json!({"type": "CANCEL"}));
        let back: WorkerRequest = decode(r#"{"type":"CANCEL"}"#).unwrap();
        assert_eq!(back, WorkerRequest::Cancel);
    }

    #[test]
    fn reply_wire_shapes() {
        let progress = WorkerReply::Progress(ProgressPayload {
            iteration: 3,
            total_iterations: 10,
            current_utilization: 0.5,
        });
        assert_eq!(
            to_value(&progress),
            json!({"type": "PROGRESS", "payload": {"iteration": 3, "totalIterations": 10, "currentUtilization": 0.5}})
        );

        let error = WorkerReply::Error(ErrorPayload::new(ErrorCode::OptimizerLoadFailed, "no module"));
        assert_eq!(
            to_value(&error),
            json!({"type": "ERROR", "payload": {"message": "no module", "code": "OPTIMIZER_LOAD_FAILED"}})
        );

        let result = WorkerReply::Result(NestResultPayload {
            placements: vec![ResultPlacement {
                part_id: "p1".into(),
                sheet_index: 0,
                x: 0.0,
                y: 0.0,
                width: 100.0,
                height: 50.0,
                rotation: 0.0,
            }],
            sheets_used: 1,
            utilization: vec![0.25],
            iterations_run: 7,
            algorithm: "genetic".into(),
        });
        let value = to_value(&result);
        assert_eq!(value["type"], "RESULT");
        assert_eq!(value["payload"]["placements"][0]["partId"], "p1");
        assert_eq!(value["payload"]["sheetsUsed"], 1);
        assert_eq!(value["payload"]["iterationsRun"], 7);
    }

    #[test]
    fn ready_accepts_the_legacy_field_name() {
        let legacy: WorkerReply = decode(r#"{"type":"READY","payload":{"wasmAvailable":true}}"#).unwrap();
        assert_eq!(
            legacy,
            WorkerReply::Ready(ReadyPayload {
                advanced_available: true
            })
        );
        let value = to_value(&legacy);
        assert_eq!(value["payload"]["advancedAvailable"], true);
    }

    #[test]
    fn error_accepts_the_legacy_load_failure_code() {
        let legacy: WorkerReply =
            decode(r#"{"type":"ERROR","payload":{"message":"x","code":"WASM_LOAD_FAILED"}}"#).unwrap();
        assert_eq!(
            legacy,
            WorkerReply::Error(ErrorPayload::new(ErrorCode::OptimizerLoadFailed, "x"))
        );
        let value = to_value(&legacy);
        assert_eq!(value["payload"]["code"], "OPTIMIZER_LOAD_FAILED");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode::<WorkerReply>(r#"{"type":"EXPLODE"}"#).is_err());
        assert!(decode::<WorkerReply>("not json").is_err());
    }
}

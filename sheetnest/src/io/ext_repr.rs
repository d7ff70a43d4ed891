use serde::{Deserialize, Serialize};

use crate::config::NestingConfigOverrides;
use crate::entities::{NestingResult, Part, Sheet, UnplacedPart};

/// A nesting instance as stored on disk: one sheet type, the parts to cut and optional configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtInstance {
    #[serde(default)]
    pub name: Option<String>,
    pub sheet: Sheet,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub config: NestingConfigOverrides,
}

/// A solved nesting instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtSolution {
    pub result: NestingResult,
    /// Requested units which did not receive a placement
    pub unplaced: Vec<UnplacedPart>,
    /// Name of the backend that produced the result
    pub algorithm: String,
    pub advanced_available: bool,
}

impl ExtSolution {
    pub fn new(result: NestingResult, parts: &[Part], algorithm: &str, advanced_available: bool) -> Self {
        ExtSolution {
            unplaced: result.unplaced(parts),
            result,
            algorithm: algorithm.to_string(),
            advanced_available,
        }
    }
}

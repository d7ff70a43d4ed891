use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// Rectangular stock sheet. One definition is reused for every physical sheet a run opens.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub width: f64,
    pub height: f64,
}

impl Sheet {
    pub fn new(width: f64, height: f64) -> Self {
        Sheet { width, height }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.width.is_finite() && self.width > 0.0 && self.height.is_finite() && self.height > 0.0,
            "invalid sheet dimensions, width: {}, height: {}",
            self.width,
            self.height
        );
        Ok(())
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

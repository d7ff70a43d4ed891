use anyhow::Result;
use log::debug;
use sheetnest::config::NestingConfigOverrides;
use sheetnest::entities::{NestingProgress, NestingResult, Part, Sheet, UnplacedPart};

use crate::coordinator::{Coordinator, JobState};

/// Everything belonging to one nesting run: its input, the progress observed while it ran and how it ended.
///
/// A session is created per request and dropped afterwards, nothing is shared between runs.
#[derive(Clone, Debug)]
pub struct NestingSession {
    pub parts: Vec<Part>,
    pub sheet: Sheet,
    pub overrides: NestingConfigOverrides,
    progress_log: Vec<NestingProgress>,
    outcome: Option<JobState>,
    result: Option<NestingResult>,
    error: Option<String>,
    advanced_available: Option<bool>,
}

impl NestingSession {
    pub fn new(parts: Vec<Part>, sheet: Sheet, overrides: NestingConfigOverrides) -> Self {
        NestingSession {
            parts,
            sheet,
            overrides,
            progress_log: vec![],
            outcome: None,
            result: None,
            error: None,
            advanced_available: None,
        }
    }

    /// Submits the session's job to `coordinator` and records its progress until the job ends.
    /// Errors only on invalid input or when the coordinator is busy.
    pub async fn run(&mut self, coordinator: &Coordinator) -> Result<Option<&NestingResult>> {
        self.progress_log.clear();
        self.result = None;
        self.error = None;

        let mut progress_rx = coordinator.subscribe_progress();
        progress_rx.mark_unchanged();
        let mut progress_open = true;

        let nest = coordinator.nest(&self.parts, &self.sheet, &self.overrides);
        tokio::pin!(nest);

        let nested = loop {
            tokio::select! {
                biased;
                changed = progress_rx.changed(), if progress_open => match changed {
                    Ok(()) => {
                        if let Some(progress) = *progress_rx.borrow_and_update() {
                            self.progress_log.push(progress);
                        }
                    }
                    Err(_) => progress_open = false,
                },
                nested = &mut nest => break nested,
            }
        };
        //the last report may arrive in the same poll as the result
        if progress_rx.has_changed().unwrap_or(false) {
            if let Some(progress) = *progress_rx.borrow_and_update() {
                self.progress_log.push(progress);
            }
        }

        let nested = nested?;
        self.outcome = coordinator.last_outcome();
        self.advanced_available = Some(coordinator.advanced_available());
        match nested {
            Some(result) => self.result = Some(result),
            None => self.error = coordinator.last_error(),
        }
        debug!(
            "[COORD] session ended ({}) after {} progress reports",
            self.outcome.map_or("unknown".to_string(), |o| o.to_string()),
            self.progress_log.len()
        );
        Ok(self.result.as_ref())
    }

    /// Progress reports received during the last run, in order
    pub fn progress_log(&self) -> &[NestingProgress] {
        &self.progress_log
    }

    pub fn outcome(&self) -> Option<JobState> {
        self.outcome
    }

    pub fn result(&self) -> Option<&NestingResult> {
        self.result.as_ref()
    }

    /// Error text of a failed run
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Requested units left out of the result
    pub fn unplaced(&self) -> Vec<UnplacedPart> {
        self.result
            .as_ref()
            .map(|r| r.unplaced(&self.parts))
            .unwrap_or_default()
    }

    /// Whether the run was served by the optimizer, `None` before the first run
    pub fn advanced_available(&self) -> Option<bool> {
        self.advanced_available
    }
}

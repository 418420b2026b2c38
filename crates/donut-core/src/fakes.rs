//! In-memory report generator (testing only)
//!
//! `StaticGenerator` answers every request with a fixed verdict or error and
//! records the requests it was given.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{DonutError, ReportConsole, Result};
use crate::generator::{GenerationRequest, ReportGenerator};

#[derive(Debug)]
pub struct StaticGenerator {
    outcome: std::result::Result<ReportConsole, String>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl StaticGenerator {
    /// Always answers with `console`.
    pub fn new(console: ReportConsole) -> Self {
        Self {
            outcome: Ok(console),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reports a passing build.
    pub fn passing() -> Self {
        Self::new(ReportConsole::passed())
    }

    /// Reports a failed build.
    pub fn failing() -> Self {
        Self::new(ReportConsole::failed())
    }

    /// Fails every request with a generator error.
    pub fn erroring(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportGenerator for StaticGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ReportConsole> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcome.clone().map_err(DonutError::Generator)
    }
}

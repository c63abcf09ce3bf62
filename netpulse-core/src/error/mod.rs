/*
 *     Copyright 2025 The Netpulse Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

pub mod errors;

pub use errors::ErrorType;
pub use errors::ExternalError;

pub use errors::OrErr;

// NPError is the error for netpulse.
#[derive(thiserror::Error, Debug)]
pub enum NPError {
    // IO is the error for IO operation.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    // AlreadyRunning is the error when the sampler is started twice.
    #[error("monitoring is already running")]
    AlreadyRunning,

    // NotRunning is the error when the sampler is stopped while stopped.
    #[error("monitoring is not running")]
    NotRunning,

    // ProbeFailed is the error when the metrics probe can not take a reading.
    #[error("probe failed: {0}")]
    ProbeFailed(String),

    // ReportNotFound is the error when the report is not found.
    #[error("report {0} not found")]
    ReportNotFound(String),

    // BackendUnavailable is the error when the report backend is not configured.
    #[error("report backend {0} is unavailable")]
    BackendUnavailable(String),

    // InvalidParameter is the error when the parameter is invalid.
    #[error("invalid parameter {0}")]
    InvalidParameter(String),

    // Unknown is the error when the error is unknown.
    #[error("unknown {0}")]
    Unknown(String),

    // TokioJoinError is the error for tokio join.
    #[error(transparent)]
    TokioJoinError(#[from] tokio::task::JoinError),

    // ExternalError is the error for external error.
    #[error(transparent)]
    ExternalError(#[from] ExternalError),

    // ValidationError is the error for validate.
    #[error("validate failed: {0}")]
    ValidationError(String),
}

// ValidationErrors is the error for validator.
impl From<validator::ValidationErrors> for NPError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl NPError {
    // is_soft returns true if the error is an expected condition of the
    // sampler state machine rather than a failure.
    pub fn is_soft(&self) -> bool {
        matches!(self, NPError::AlreadyRunning | NPError::NotRunning)
    }
}

//! Stage model
//!
//! The closed set of provisioning stages, per-stage status records, and the
//! roll-up rule that derives one overall job status from the stage map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One named unit of provisioning work within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProvisionStage {
    /// The subscription-user record itself.
    User,
    /// Plex library sharing.
    Plex,
    /// IPTV panel account.
    Iptv,
    /// IPTV-Editor account, dependent on the IPTV stage's outcome.
    IptvEditor,
}

impl ProvisionStage {
    /// All recognized stages.
    #[must_use]
    pub fn all() -> &'static [ProvisionStage] {
        &[
            ProvisionStage::User,
            ProvisionStage::Plex,
            ProvisionStage::Iptv,
            ProvisionStage::IptvEditor,
        ]
    }

    /// Get the string representation used in status payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStage::User => "user",
            ProvisionStage::Plex => "plex",
            ProvisionStage::Iptv => "iptv",
            ProvisionStage::IptvEditor => "iptvEditor",
        }
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProvisionStage {
    type Err = ParseStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ProvisionStage::User),
            "plex" => Ok(ProvisionStage::Plex),
            "iptv" => Ok(ProvisionStage::Iptv),
            "iptvEditor" => Ok(ProvisionStage::IptvEditor),
            _ => Err(ParseStageError(s.to_string())),
        }
    }
}

/// Error parsing a stage name from a string.
#[derive(Debug, Clone, Error)]
#[error("invalid stage '{0}', expected one of: user, plex, iptv, iptvEditor")]
pub struct ParseStageError(String);

/// Status of one stage, and of the job as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    /// Not started (default for a job with no registered stages yet).
    #[default]
    Pending,
    /// Work in flight.
    Processing,
    /// Finished successfully (or deliberately marked done, e.g. "not enabled").
    Completed,
    /// Finished unsuccessfully. Never reverts within one job.
    Failed,
}

impl StageState {
    /// Get the string representation used in status payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StageState::Pending => "pending",
            StageState::Processing => "processing",
            StageState::Completed => "completed",
            StageState::Failed => "failed",
        }
    }

    /// Whether this state can no longer change within the job.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StageState::Completed | StageState::Failed)
    }

    /// Derive the overall job status from the present stage statuses.
    ///
    /// 1. Non-empty and all completed: completed.
    /// 2. Any failed: failed.
    /// 3. Any processing: processing.
    /// 4. Otherwise pending (including the empty set).
    pub fn roll_up<'a, I>(states: I) -> StageState
    where
        I: IntoIterator<Item = &'a StageState>,
    {
        let mut seen_any = false;
        let mut all_completed = true;
        let mut any_failed = false;
        let mut any_processing = false;

        for state in states {
            seen_any = true;
            match state {
                StageState::Completed => {}
                StageState::Failed => {
                    all_completed = false;
                    any_failed = true;
                }
                StageState::Processing => {
                    all_completed = false;
                    any_processing = true;
                }
                StageState::Pending => all_completed = false,
            }
        }

        if seen_any && all_completed {
            StageState::Completed
        } else if any_failed {
            StageState::Failed
        } else if any_processing {
            StageState::Processing
        } else {
            StageState::Pending
        }
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One provisioning stage's recorded outcome.
///
/// The message is free text and may deliberately embed generated credentials;
/// it is only ever surfaced to an authenticated admin caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatus {
    pub status: StageState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl StageStatus {
    /// Record a stage outcome stamped with the current time.
    pub fn new(status: StageState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use StageState::{Completed, Failed, Pending, Processing};

    fn roll(states: &[StageState]) -> StageState {
        StageState::roll_up(states.iter())
    }

    #[test]
    fn roll_up_empty_is_pending() {
        assert_eq!(roll(&[]), Pending);
    }

    #[test]
    fn roll_up_all_completed() {
        assert_eq!(roll(&[Completed]), Completed);
        assert_eq!(roll(&[Completed, Completed, Completed]), Completed);
    }

    #[test]
    fn roll_up_any_failed_wins_over_processing() {
        assert_eq!(roll(&[Completed, Failed, Completed]), Failed);
        assert_eq!(roll(&[Processing, Failed]), Failed);
        assert_eq!(roll(&[Pending, Failed, Processing, Completed]), Failed);
    }

    #[test]
    fn roll_up_processing_wins_over_pending() {
        assert_eq!(roll(&[Processing, Pending]), Processing);
        assert_eq!(roll(&[Completed, Processing]), Processing);
    }

    #[test]
    fn roll_up_pending_default() {
        assert_eq!(roll(&[Pending]), Pending);
        assert_eq!(roll(&[Pending, Completed]), Pending);
    }

    #[test]
    fn stage_names_roundtrip() {
        for stage in ProvisionStage::all() {
            assert_eq!(stage.as_str().parse::<ProvisionStage>().unwrap(), *stage);
        }
        assert!("userEditor".parse::<ProvisionStage>().is_err());
    }

    #[test]
    fn stage_serializes_as_camel_case() {
        let json = serde_json::to_string(&ProvisionStage::IptvEditor).unwrap();
        assert_eq!(json, "\"iptvEditor\"");
        let json = serde_json::to_string(&StageState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Processing.is_terminal());
    }
}

use std::fmt;

use thiserror::Error;

use crate::gateway::GatewayFault;

/// Remote operation a transport fault happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallStep {
    GetCapabilities,
    GetProfiles,
    GetStreamUri,
    CreatePullPointSubscription,
    Renew,
    PullMessages,
}

impl CallStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStep::GetCapabilities => "GetCapabilities",
            CallStep::GetProfiles => "GetProfiles",
            CallStep::GetStreamUri => "GetStreamUri",
            CallStep::CreatePullPointSubscription => "CreatePullPointSubscription",
            CallStep::Renew => "Renew",
            CallStep::PullMessages => "PullMessages",
        }
    }
}

impl fmt::Display for CallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFault {
    #[error("notification message has no Data element")]
    NoDataElement,
    #[error("no IsMotion item in pulled notifications")]
    NoMotionItem,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("{step} failed: {}", .fault.as_deref().unwrap_or("no fault detail"))]
    TransportFault {
        step: CallStep,
        fault: Option<String>,
    },
    #[error("Device has no media profile")]
    NoProfiles,
    #[error("Device media profile has no stream uri")]
    NoStreamUri,
    #[error("Malformed notification: {reason}")]
    MalformedNotification { reason: NotificationFault },
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Player refused to play {uri}")]
    PlaybackFailed { uri: String },
    #[error("Player reached end of stream")]
    StreamEnded,
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl MonitorError {
    pub fn transport(step: CallStep, fault: GatewayFault) -> Self {
        MonitorError::TransportFault {
            step,
            fault: Some(fault.to_string()),
        }
    }

    pub fn malformed(reason: NotificationFault) -> Self {
        MonitorError::MalformedNotification { reason }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, MonitorError::Cancelled)
    }

    /// Step of a transport fault, if this is one.
    pub fn step(&self) -> Option<CallStep> {
        match self {
            MonitorError::TransportFault { step, .. } => Some(*step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_fault_message_names_the_step() {
        let err = MonitorError::transport(
            CallStep::GetProfiles,
            GatewayFault::with_status("Sender not Authorized", 401),
        );
        assert_eq!(
            err.to_string(),
            "GetProfiles failed: Sender not Authorized (HTTP status 401)"
        );
        assert_eq!(err.step(), Some(CallStep::GetProfiles));

        let bare = MonitorError::TransportFault {
            step: CallStep::Renew,
            fault: None,
        };
        assert_eq!(bare.to_string(), "Renew failed: no fault detail");
    }
}

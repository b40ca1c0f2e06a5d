//! Classification of failures that reach the containment boundary.

use crate::core::errors::{ConfigError, Interrupted, RunError};

/// Subsystem tag for configuration faults.
pub const CONFIG_TAG: &str = "RunConfig";
/// Subsystem tag for dispatch faults.
pub const DISPATCH_TAG: &str = "Dispatcher";

/// How the containment boundary must treat a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Stop requested by the host. Return promptly, never hold.
    Cancellation,
    /// Recognised failure from a known subsystem.
    Domain { tag: String, message: String },
    /// Anything else.
    Unclassified { message: String },
}

impl Fault {
    pub fn message(&self) -> Option<&str> {
        match self {
            Fault::Cancellation => None,
            Fault::Domain { message, .. } | Fault::Unclassified { message } => Some(message),
        }
    }
}

/// Classify `err` by walking its cause chain.
///
/// Interruption anywhere in the chain wins: a device failure caused by a stop
/// request is still a cancellation.
pub fn classify_fault(err: &anyhow::Error) -> Fault {
    let message = format!("{err:#}");
    let mut domain_tag = None;
    for cause in err.chain() {
        if cause.is::<Interrupted>() {
            return Fault::Cancellation;
        }
        if domain_tag.is_some() {
            continue;
        }
        if cause.is::<ConfigError>() {
            domain_tag = Some(CONFIG_TAG.to_string());
        } else if let Some(run_err) = cause.downcast_ref::<RunError>() {
            match run_err {
                RunError::Interrupted(_) => return Fault::Cancellation,
                RunError::Device(_) => {}
                _ => domain_tag = Some(DISPATCH_TAG.to_string()),
            }
        } else if let Some(tagged) = cause.downcast_ref::<TaggedFault>() {
            domain_tag = Some(tagged.tag.clone());
        }
    }
    match domain_tag {
        Some(tag) => Fault::Domain { tag, message },
        None => Fault::Unclassified { message },
    }
}

/// A domain failure raised by orchestration code that has no richer type.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TaggedFault {
    pub tag: String,
    pub message: String,
}

impl TaggedFault {
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn interrupted_is_cancellation_even_when_wrapped() {
        let err = Err::<(), _>(Interrupted)
            .context("drive forward")
            .unwrap_err();
        assert_eq!(classify_fault(&err), Fault::Cancellation);

        let err = anyhow::Error::new(RunError::Interrupted(Interrupted));
        assert_eq!(classify_fault(&err), Fault::Cancellation);
    }

    #[test]
    fn config_and_run_errors_are_domain_faults() {
        let err = anyhow::Error::new(ConfigError::DuplicateBranch).context("load TEST");
        match classify_fault(&err) {
            Fault::Domain { tag, message } => {
                assert_eq!(tag, CONFIG_TAG);
                assert!(message.contains("only one OCV_CHOICE"));
            }
            other => panic!("unexpected fault {other:?}"),
        }

        let err = anyhow::Error::new(RunError::UnsupportedCommand("JUMP".to_string()));
        assert!(matches!(classify_fault(&err), Fault::Domain { tag, .. } if tag == DISPATCH_TAG));
    }

    #[test]
    fn device_and_plain_errors_are_unclassified() {
        let err = anyhow::Error::new(RunError::Device(anyhow!("bus timeout")));
        assert!(matches!(classify_fault(&err), Fault::Unclassified { .. }));

        let err = anyhow!("something odd");
        assert_eq!(
            classify_fault(&err),
            Fault::Unclassified {
                message: "something odd".to_string()
            }
        );
    }

    #[test]
    fn tagged_fault_keeps_its_tag() {
        let err = anyhow::Error::new(TaggedFault::new("Autonomous", "alliance is UNKNOWN"));
        assert_eq!(
            classify_fault(&err),
            Fault::Domain {
                tag: "Autonomous".to_string(),
                message: "alliance is UNKNOWN".to_string()
            }
        );
    }
}

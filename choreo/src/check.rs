//! Offline validation of an action document for one run-selector.

use std::path::Path;

use serde::Serialize;

use crate::core::action::Command;
use crate::core::errors::{ConfigError, RunError};
use crate::core::run_config::RunConfiguration;
use crate::core::types::Zone;
use crate::io::document::parse_document;

/// Shape of a loaded run, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub run_selector: String,
    pub actions: usize,
    /// Branch step count per zone, `None` if the run has no branch step.
    pub branches: Option<Vec<(Zone, usize)>>,
    /// Action names that the dispatcher will reject at run time.
    pub unsupported: Vec<String>,
    /// Attribute values that will fault the run when their step is reached.
    pub invalid: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub summary: CheckSummary,
    pub config: RunConfiguration,
}

/// Load `run_selector` from `document` and summarize it.
///
/// Load errors are returned as-is. Unsupported command names are not load
/// errors; they are reported in the summary.
pub fn check_document(document: &Path, run_selector: &str) -> Result<CheckOutcome, ConfigError> {
    let config = parse_document(document, run_selector)?;
    let branches = config.branch_table.as_ref().map(|table| {
        Zone::ALL
            .into_iter()
            .map(|zone| (zone, table.get(zone).len()))
            .collect()
    });
    let branch_steps = config
        .branch_table
        .iter()
        .flat_map(|table| Zone::ALL.into_iter().flat_map(move |zone| table.get(zone)));
    let mut unsupported = Vec::new();
    let mut invalid = Vec::new();
    for step in config.actions.iter().chain(branch_steps) {
        match Command::resolve(step) {
            Err(RunError::UnsupportedCommand(_)) => unsupported.push(step.name.clone()),
            Err(err @ RunError::InvalidValue { .. }) => invalid.push(err.to_string()),
            _ => {}
        }
    }
    Ok(CheckOutcome {
        summary: CheckSummary {
            run_selector: run_selector.to_string(),
            actions: config.actions.len(),
            branches,
            unsupported,
            invalid,
        },
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{action_document, write_document};

    #[test]
    fn summarizes_branch_table_and_unsupported_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        let xml = action_document(
            "TEST",
            "",
            r#"<SLEEP ms="5"/><OCV_CHOICE><LEFT><JUMP/></LEFT><CENTER/><RIGHT><SLEEP ms="1"/><SLEEP ms="2"/></RIGHT></OCV_CHOICE><SPIN/>"#,
        );
        let path = write_document(temp.path(), &xml);

        let outcome = check_document(&path, "TEST").expect("check");
        assert_eq!(outcome.summary.actions, 3);
        assert_eq!(
            outcome.summary.branches,
            Some(vec![(Zone::Left, 1), (Zone::Center, 0), (Zone::Right, 2)])
        );
        assert_eq!(outcome.summary.unsupported, vec!["SPIN", "JUMP"]);
    }

    #[test]
    fn invalid_sleep_value_is_not_reported_as_unsupported() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_document(
            temp.path(),
            &action_document("TEST", "", r#"<SLEEP ms="soon"/>"#),
        );
        let outcome = check_document(&path, "TEST").expect("check");
        assert!(outcome.summary.unsupported.is_empty());
        assert_eq!(
            outcome.summary.invalid,
            vec!["invalid value 'soon' for attribute 'ms' of SLEEP"]
        );
        assert_eq!(outcome.summary.branches, None);
    }

    #[test]
    fn oversized_drive_seconds_is_reported_not_panicked() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_document(
            temp.path(),
            &action_document(
                "TEST",
                "",
                r#"<OCV_CHOICE><LEFT/><CENTER><FORWARD_BY_TIME seconds="1e30"/></CENTER><RIGHT/></OCV_CHOICE>"#,
            ),
        );
        let outcome = check_document(&path, "TEST").expect("check");
        assert_eq!(
            outcome.summary.invalid,
            vec!["invalid value '1e30' for attribute 'seconds' of FORWARD_BY_TIME"]
        );
    }

    #[test]
    fn load_errors_pass_through() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = write_document(temp.path(), &action_document("OTHER", "", ""));
        let err = check_document(&path, "TEST").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}

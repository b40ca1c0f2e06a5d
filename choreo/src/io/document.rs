//! Action document (`RobotAction.xml`) loader.
//!
//! The document holds one `<OpMode id="...">` section per run-selector. Only
//! the requested section is read. Parameter elements follow a fixed order;
//! text, whitespace and comment nodes never take part in ordering or counting.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::{debug, info, instrument};

use crate::core::action::{ActionStep, is_branch_marker};
use crate::core::errors::ConfigError;
use crate::core::run_config::{BranchTable, RunConfiguration};
use crate::core::types::{LogThreshold, Rect, StartingPose, TagId, Zone};
use crate::io::roi::parse_roi;

pub const ROOT_ELEMENT: &str = "RobotAction";
pub const OPMODE_ELEMENT: &str = "OpMode";

/// Load the configuration for `run_selector` from the document at `path`.
#[instrument(skip_all, fields(path = %path.display(), run = run_selector))]
pub fn parse_document(path: &Path, run_selector: &str) -> Result<RunConfiguration, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document_str(&contents, run_selector)
}

/// Same as [`parse_document`] for an in-memory document.
pub fn parse_document_str(xml: &str, run_selector: &str) -> Result<RunConfiguration, ConfigError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if name(root) != ROOT_ELEMENT {
        return Err(ConfigError::MalformedStructure(format!(
            "expected root element <{ROOT_ELEMENT}>, found <{}>",
            name(root)
        )));
    }

    let op_mode = elements(root)
        .find(|node| name(*node) == OPMODE_ELEMENT && node.attribute("id") == Some(run_selector))
        .ok_or_else(|| ConfigError::NotFound(run_selector.to_string()))?;
    info!(run = run_selector, "extracting action data");

    let parameters = elements(op_mode)
        .next()
        .filter(|node| name(*node) == "parameters")
        .ok_or_else(|| {
            ConfigError::MalformedStructure("missing required <parameters> element".to_string())
        })?;
    let params = parse_parameters(parameters)?;

    let actions_node = elements(op_mode)
        .find(|node| name(*node) == "actions")
        .ok_or_else(|| ConfigError::MissingField("actions".to_string()))?;
    let (actions, branch_table) = parse_actions(actions_node)?;

    debug!(
        actions = actions.len(),
        branching = branch_table.is_some(),
        "action data extracted"
    );
    Ok(RunConfiguration {
        logging_threshold: params.logging_threshold,
        region_of_interest: params.region_of_interest,
        tags_of_interest: params.tags_of_interest,
        starting_pose: params.starting_pose,
        actions,
        branch_table,
    })
}

#[derive(Default)]
struct Parameters {
    logging_threshold: Option<LogThreshold>,
    starting_pose: Option<StartingPose>,
    region_of_interest: Rect,
    tags_of_interest: Vec<TagId>,
}

/// Optional children, in this order only: `lowest_logging_level`,
/// `starting_position`, `image_roi`, `vumarks`.
fn parse_parameters(node: Node<'_, '_>) -> Result<Parameters, ConfigError> {
    let mut params = Parameters::default();
    let mut rest = elements(node).peekable();

    if let Some(level) = rest.next_if(|n| name(*n) == "lowest_logging_level") {
        params.logging_threshold = parse_logging_threshold(level)?;
    }
    if let Some(position) = rest.next_if(|n| name(*n) == "starting_position") {
        params.starting_pose = Some(parse_starting_position(position)?);
    }
    if let Some(roi) = rest.next_if(|n| name(*n) == "image_roi") {
        params.region_of_interest = parse_roi(roi)?;
    }
    if let Some(tags) = rest.next_if(|n| name(*n) == "vumarks") {
        params.tags_of_interest = parse_tags(tags)?;
    }

    if let Some(extra) = rest.next() {
        return Err(ConfigError::UnexpectedElement {
            parent: "parameters".to_string(),
            element: name(extra).to_string(),
        });
    }
    Ok(params)
}

fn parse_logging_threshold(node: Node<'_, '_>) -> Result<Option<LogThreshold>, ConfigError> {
    let text = text_content(node);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            field: "lowest_logging_level".to_string(),
            value: text.to_string(),
        })
}

fn parse_starting_position(node: Node<'_, '_>) -> Result<StartingPose, ConfigError> {
    let mut fields = elements(node);
    let x = parse_field(fields.next(), "x")?;
    let y = parse_field(fields.next(), "y")?;
    let heading = parse_field(fields.next(), "angle")?;
    Ok(StartingPose { x, y, heading })
}

fn parse_tags(node: Node<'_, '_>) -> Result<Vec<TagId>, ConfigError> {
    let mut tags = Vec::new();
    for element in elements(node) {
        let tag: TagId = name(element)
            .parse()
            .map_err(|_| ConfigError::UnknownEnumValue {
                kind: "vumark",
                name: name(element).to_string(),
            })?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn parse_actions(
    node: Node<'_, '_>,
) -> Result<(Vec<ActionStep>, Option<BranchTable>), ConfigError> {
    check_branch_markers(node)?;
    let mut actions = Vec::new();
    let mut branch_table = None;
    for element in elements(node) {
        let step = action_step(element);
        if step.is_branch_marker() {
            // Zone sequences are spliced into the stream at run time.
            branch_table = Some(parse_branch_table(element)?);
        }
        actions.push(step);
    }
    Ok((actions, branch_table))
}

fn parse_branch_table(node: Node<'_, '_>) -> Result<BranchTable, ConfigError> {
    debug!("processing target zones");
    let zone_nodes: Vec<_> = elements(node).collect();
    if zone_nodes.len() != Zone::ALL.len() {
        return Err(ConfigError::IncompleteBranchTable {
            found: zone_nodes.len(),
        });
    }

    let mut table = BranchTable::default();
    let mut seen = HashSet::new();
    for zone_node in zone_nodes {
        let zone: Zone = name(zone_node)
            .parse()
            .map_err(|_| ConfigError::UnknownEnumValue {
                kind: "target zone",
                name: name(zone_node).to_string(),
            })?;
        if !seen.insert(zone) {
            return Err(ConfigError::IncompleteBranchTable {
                found: Zone::ALL.len(),
            });
        }
        *table.slot_mut(zone) = collect_zone_actions(zone_node);
    }
    Ok(table)
}

/// At most one branch marker may appear at any depth under `actions`, and it
/// must be a direct child of `actions`.
fn check_branch_markers(actions: Node<'_, '_>) -> Result<(), ConfigError> {
    let mut markers = actions
        .descendants()
        .filter(|node| node.is_element() && is_branch_marker(name(*node)));
    let Some(marker) = markers.next() else {
        return Ok(());
    };
    if markers.next().is_some() {
        return Err(ConfigError::DuplicateBranch);
    }
    match marker.parent_element() {
        Some(parent) if parent == actions => Ok(()),
        parent => Err(ConfigError::UnexpectedElement {
            parent: parent.map_or("", name).to_string(),
            element: name(marker).to_string(),
        }),
    }
}

/// A zone with no children is valid: zero actions for that outcome.
fn collect_zone_actions(node: Node<'_, '_>) -> Vec<ActionStep> {
    elements(node).map(action_step).collect()
}

fn action_step(node: Node<'_, '_>) -> ActionStep {
    let mut step = ActionStep::new(name(node));
    for attribute in node.attributes() {
        step = step.with_attribute(attribute.name(), attribute.value());
    }
    step
}

/// Read the next ordered child, which must be named `field` and hold a
/// non-empty value of type `T`.
pub(crate) fn parse_field<T: FromStr>(
    next: Option<Node<'_, '_>>,
    field: &str,
) -> Result<T, ConfigError> {
    let node = next
        .filter(|node| name(*node) == field)
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;
    let text = text_content(node);
    let text = text.trim();
    if text.is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    text.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: text.to_string(),
    })
}

pub(crate) fn elements<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|child| child.is_element())
}

fn name<'a>(node: Node<'a, '_>) -> &'a str {
    node.tag_name().name()
}

fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect()
}

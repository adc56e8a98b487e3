/*!
 * Power quality value extraction.
 *
 * Measured values (`MX`) sit at different depths in a device model. A data
 * object whose direct children include a quality attribute is a single
 * measurement point (`TotW` → `mag` → `f`); otherwise each of its children is
 * one (`PhV` → `phsA` → `cVal` → `mag` → `f`). The walker discovers which
 * shape it is looking at and produces one [`DataSample`] per point.
 */
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use gridlink_core::decimal::Decimal;
use gridlink_devices::{
    FunctionalConstraint, LogicalDevice, LogicalNode, ModelNode, NodeKind, ServerModel,
};

use crate::types::{DataSample, GetPqValuesResponse, LogicalDeviceSample, LogicalNodeSample};

/// A float leaf together with the names of the attributes leading to it
struct FloatLeaf<'a> {
    path: Vec<&'a str>,
    value: f32,
}

/// Extract the power quality values of every logical node in the model.
///
/// Logical devices and nodes without samples are left out.
pub fn extract_pq_values(model: &ServerModel) -> GetPqValuesResponse {
    let logical_devices: Vec<LogicalDeviceSample> = model
        .logical_devices
        .iter()
        .filter_map(process_logical_device)
        .collect();

    debug!(
        "Extracted power quality values from {} logical devices",
        logical_devices.len()
    );
    GetPqValuesResponse { logical_devices }
}

fn process_logical_device(device: &LogicalDevice) -> Option<LogicalDeviceSample> {
    let logical_nodes: Vec<LogicalNodeSample> = device
        .logical_nodes
        .iter()
        .filter_map(|ln| {
            let samples = process_logical_node(ln);
            (!samples.is_empty()).then(|| LogicalNodeSample {
                name: ln.name.clone(),
                samples,
            })
        })
        .collect();

    (!logical_nodes.is_empty()).then(|| LogicalDeviceSample {
        name: device.name.clone(),
        logical_nodes,
    })
}

/// Extract the non-empty samples of one logical node
pub fn process_logical_node(node: &LogicalNode) -> Vec<DataSample> {
    let mut samples = Vec::new();
    for (name, constraints) in group_by_name(node) {
        for fc in constraints {
            if fc != FunctionalConstraint::MX {
                continue;
            }
            if let Some(data_object) = node.child(name, fc) {
                samples.extend(
                    process_data_object(data_object)
                        .into_iter()
                        .filter(|s| !s.is_empty()),
                );
            }
        }
    }
    trace!("Logical node {} yielded {} samples", node.name, samples.len());
    samples
}

/// Data object names in first-appearance order, each with the constraints it occurs under
fn group_by_name(node: &LogicalNode) -> Vec<(&str, BTreeSet<FunctionalConstraint>)> {
    let mut groups: Vec<(&str, BTreeSet<FunctionalConstraint>)> = Vec::new();
    for data_object in &node.data_objects {
        let Some(fc) = data_object.fc else {
            continue;
        };
        match groups.iter_mut().find(|(name, _)| *name == data_object.name) {
            Some((_, constraints)) => {
                constraints.insert(fc);
            }
            None => groups.push((data_object.name.as_str(), BTreeSet::from([fc]))),
        }
    }
    groups
}

/// Samples of one measured data object, empty ones included
pub fn process_data_object(node: &ModelNode) -> Vec<DataSample> {
    if !node.has_children() {
        return Vec::new();
    }
    if node.children.iter().any(ModelNode::is_quality) {
        vec![single_point(node)]
    } else {
        node.children
            .iter()
            .map(|child| nested_point(node, child))
            .collect()
    }
}

/// `<node>.<floatParent>.<float>`
fn single_point(node: &ModelNode) -> DataSample {
    let timestamp = find_timestamp(node);
    let sample = find_float_in_constructed(node, 1).and_then(|leaf| {
        let value = Decimal::from_f32(leaf.value)?;
        let mut name = vec![node.name.as_str()];
        name.extend(leaf.path);
        Some(DataSample::new(name.join("."), timestamp, value))
    });
    sample.unwrap_or_else(|| DataSample::empty(timestamp))
}

/// `<parent>.<child>.<floatGrandparent>.<floatParent>.<float>`
fn nested_point(parent: &ModelNode, child: &ModelNode) -> DataSample {
    if !child.has_children() {
        return DataSample::empty(None);
    }
    let timestamp = find_timestamp(child);
    let sample = find_float_in_constructed(child, 2).and_then(|leaf| {
        let value = Decimal::from_f32(leaf.value)?;
        let mut name = vec![parent.name.as_str(), child.name.as_str()];
        name.extend(leaf.path);
        Some(DataSample::new(name.join("."), timestamp, value))
    });
    sample.unwrap_or_else(|| DataSample::empty(timestamp))
}

/// Time of the first direct timestamp child
fn find_timestamp(node: &ModelNode) -> Option<DateTime<Utc>> {
    node.children
        .iter()
        .find(|c| matches!(c.kind, NodeKind::Timestamp(_)))
        .and_then(ModelNode::as_timestamp)
}

/// First float leaf found by descending `depth` levels of constructed attributes.
///
/// The returned path holds the constructed attribute names followed by the float name.
fn find_float_in_constructed(node: &ModelNode, depth: usize) -> Option<FloatLeaf<'_>> {
    if depth == 0 {
        return node.children.iter().find_map(|c| {
            c.as_float().map(|value| FloatLeaf {
                path: vec![c.name.as_str()],
                value,
            })
        });
    }
    node.children
        .iter()
        .filter(|c| c.is_composite() && c.has_children())
        .find_map(|c| {
            let mut leaf = find_float_in_constructed(c, depth - 1)?;
            leaf.path.insert(0, c.name.as_str());
            Some(leaf)
        })
}

/*!
 * Device object model.
 *
 * A device exposes a hierarchical, named model: server → logical devices →
 * logical nodes → data objects → data attributes. Data objects carry a
 * functional constraint; attributes are [`ModelNode`]s whose [`NodeKind`]
 * tells what value, if any, they hold.
 */
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// Functional constraint of a data object
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunctionalConstraint {
    /// Status information
    ST,
    /// Measured values
    MX,
    /// Set points
    SP,
    /// Substituted values
    SV,
    /// Configuration
    CF,
    /// Description
    DC,
    /// Setting group
    SG,
    /// Setting group editable
    SE,
    /// Service response
    SR,
    /// Operate received
    OR,
    /// Blocking
    BL,
    /// Extended definition
    EX,
    /// Control
    CO,
}

impl FunctionalConstraint {
    /// All functional constraints
    pub const ALL: [FunctionalConstraint; 13] = [
        FunctionalConstraint::ST,
        FunctionalConstraint::MX,
        FunctionalConstraint::SP,
        FunctionalConstraint::SV,
        FunctionalConstraint::CF,
        FunctionalConstraint::DC,
        FunctionalConstraint::SG,
        FunctionalConstraint::SE,
        FunctionalConstraint::SR,
        FunctionalConstraint::OR,
        FunctionalConstraint::BL,
        FunctionalConstraint::EX,
        FunctionalConstraint::CO,
    ];

    /// Two-letter abbreviation
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionalConstraint::ST => "ST",
            FunctionalConstraint::MX => "MX",
            FunctionalConstraint::SP => "SP",
            FunctionalConstraint::SV => "SV",
            FunctionalConstraint::CF => "CF",
            FunctionalConstraint::DC => "DC",
            FunctionalConstraint::SG => "SG",
            FunctionalConstraint::SE => "SE",
            FunctionalConstraint::SR => "SR",
            FunctionalConstraint::OR => "OR",
            FunctionalConstraint::BL => "BL",
            FunctionalConstraint::EX => "EX",
            FunctionalConstraint::CO => "CO",
        }
    }
}

impl fmt::Display for FunctionalConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionalConstraint {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FunctionalConstraint::ALL
            .iter()
            .copied()
            .find(|fc| fc.as_str() == s)
            .ok_or_else(|| DeviceError::service(format!("Unknown functional constraint: {}", s)))
    }
}

/// What a model node is, and the value it holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum NodeKind {
    /// Data object or constructed attribute containing other nodes
    Composite,
    /// Boolean leaf
    Boolean(bool),
    /// 32-bit float leaf
    Float(f32),
    /// Timestamp leaf; `None` when the device reports no time
    Timestamp(Option<DateTime<Utc>>),
    /// Quality bit string leaf
    Quality(u16),
    /// Integer or enumerated leaf
    Integer(i64),
    /// Visible string leaf
    Text(String),
    /// Any other primitive the adapter does not interpret
    Other,
}

/// A node of the device object model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelNode {
    /// Node name
    pub name: String,
    /// Functional constraint; set on data objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fc: Option<FunctionalConstraint>,
    /// Node kind
    pub kind: NodeKind,
    /// Ordered children
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    /// Create a leaf node
    pub fn leaf<S: Into<String>>(name: S, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            fc: None,
            kind,
            children: Vec::new(),
        }
    }

    /// Create a composite node
    pub fn composite<S: Into<String>>(name: S, children: Vec<ModelNode>) -> Self {
        Self {
            name: name.into(),
            fc: None,
            kind: NodeKind::Composite,
            children,
        }
    }

    /// Create a boolean leaf
    pub fn boolean<S: Into<String>>(name: S, value: bool) -> Self {
        Self::leaf(name, NodeKind::Boolean(value))
    }

    /// Create a float leaf
    pub fn float<S: Into<String>>(name: S, value: f32) -> Self {
        Self::leaf(name, NodeKind::Float(value))
    }

    /// Create a timestamp leaf
    pub fn timestamp<S: Into<String>>(name: S, value: Option<DateTime<Utc>>) -> Self {
        Self::leaf(name, NodeKind::Timestamp(value))
    }

    /// Create a quality leaf
    pub fn quality<S: Into<String>>(name: S, value: u16) -> Self {
        Self::leaf(name, NodeKind::Quality(value))
    }

    /// Create an integer leaf
    pub fn integer<S: Into<String>>(name: S, value: i64) -> Self {
        Self::leaf(name, NodeKind::Integer(value))
    }

    /// Create a text leaf
    pub fn text<S: Into<String>, T: Into<String>>(name: S, value: T) -> Self {
        Self::leaf(name, NodeKind::Text(value.into()))
    }

    /// Attach a functional constraint
    pub fn with_fc(mut self, fc: FunctionalConstraint) -> Self {
        self.fc = Some(fc);
        self
    }

    /// Whether this node is a composite (data object or constructed attribute)
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, NodeKind::Composite)
    }

    /// Whether this node is a quality leaf
    pub fn is_quality(&self) -> bool {
        matches!(self.kind, NodeKind::Quality(_))
    }

    /// Whether this node has at least one child
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Direct child by name
    pub fn child(&self, name: &str) -> Option<&ModelNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable direct child by name
    pub fn child_mut(&mut self, name: &str) -> Option<&mut ModelNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Descendant addressed by a dotted path such as `mag.f`
    pub fn find(&self, path: &str) -> Option<&ModelNode> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(self, |node, name| node.child(name))
    }

    /// Mutable descendant addressed by a dotted path
    pub fn find_mut(&mut self, path: &str) -> Option<&mut ModelNode> {
        let mut node = self;
        for name in path.split('.').filter(|s| !s.is_empty()) {
            node = node.child_mut(name)?;
        }
        Some(node)
    }

    /// Float value of a float leaf
    pub fn as_float(&self) -> Option<f32> {
        match self.kind {
            NodeKind::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Value of a boolean leaf
    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            NodeKind::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// Value of an integer leaf
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Integer(v) => Some(v),
            _ => None,
        }
    }

    /// Bits of a quality leaf
    pub fn as_quality(&self) -> Option<u16> {
        match self.kind {
            NodeKind::Quality(v) => Some(v),
            _ => None,
        }
    }

    /// Time of a timestamp leaf; `None` for other kinds and for unset timestamps
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            NodeKind::Timestamp(v) => v,
            _ => None,
        }
    }

    /// Numeric value of a boolean, integer or float leaf
    pub fn as_f64(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Boolean(v) => Some(if v { 1.0 } else { 0.0 }),
            NodeKind::Integer(v) => Some(v as f64),
            NodeKind::Float(v) => Some(f64::from(v)),
            _ => None,
        }
    }

    /// Copy the values of `other` into this node.
    ///
    /// Leaves take the kind of the matching leaf in `other`; children present
    /// only in `other` are appended.
    pub fn merge_values(&mut self, other: &ModelNode) {
        if !other.is_composite() {
            self.kind = other.kind.clone();
        }
        for incoming in &other.children {
            match self.child_mut(&incoming.name) {
                Some(existing) => existing.merge_values(incoming),
                None => self.children.push(incoming.clone()),
            }
        }
    }
}

/// A logical node and its data objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalNode {
    /// Logical node name, e.g. `MMXU1`
    pub name: String,
    /// Data objects in model order
    pub data_objects: Vec<ModelNode>,
}

impl LogicalNode {
    /// Create a logical node
    pub fn new<S: Into<String>>(name: S, data_objects: Vec<ModelNode>) -> Self {
        Self {
            name: name.into(),
            data_objects,
        }
    }

    /// Data object addressed by name and functional constraint
    pub fn child(&self, name: &str, fc: FunctionalConstraint) -> Option<&ModelNode> {
        self.data_objects
            .iter()
            .find(|d| d.name == name && d.fc == Some(fc))
    }

    /// Mutable data object addressed by name and functional constraint
    pub fn child_mut(&mut self, name: &str, fc: FunctionalConstraint) -> Option<&mut ModelNode> {
        self.data_objects
            .iter_mut()
            .find(|d| d.name == name && d.fc == Some(fc))
    }
}

/// A logical device and its logical nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalDevice {
    /// Logical device name, e.g. `ZOWN_RTUPV1`
    pub name: String,
    /// Logical nodes in model order
    pub logical_nodes: Vec<LogicalNode>,
}

impl LogicalDevice {
    /// Create a logical device
    pub fn new<S: Into<String>>(name: S, logical_nodes: Vec<LogicalNode>) -> Self {
        Self {
            name: name.into(),
            logical_nodes,
        }
    }

    /// Logical node by name
    pub fn logical_node(&self, name: &str) -> Option<&LogicalNode> {
        self.logical_nodes.iter().find(|ln| ln.name == name)
    }

    /// Mutable logical node by name
    pub fn logical_node_mut(&mut self, name: &str) -> Option<&mut LogicalNode> {
        self.logical_nodes.iter_mut().find(|ln| ln.name == name)
    }
}

/// The discovered model of a server (IED)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerModel {
    /// Logical devices in model order
    pub logical_devices: Vec<LogicalDevice>,
}

impl ServerModel {
    /// Create a server model
    pub fn new(logical_devices: Vec<LogicalDevice>) -> Self {
        Self { logical_devices }
    }

    /// Logical device by name
    pub fn logical_device(&self, name: &str) -> Option<&LogicalDevice> {
        self.logical_devices.iter().find(|ld| ld.name == name)
    }

    /// Data object addressed by a node reference
    pub fn find(&self, reference: &NodeReference) -> Option<&ModelNode> {
        self.logical_device(&reference.logical_device)?
            .logical_node(&reference.logical_node)?
            .child(&reference.data_object, reference.fc)
    }

    /// Mutable data object addressed by a node reference
    pub fn find_mut(&mut self, reference: &NodeReference) -> Option<&mut ModelNode> {
        self.logical_devices
            .iter_mut()
            .find(|ld| ld.name == reference.logical_device)?
            .logical_node_mut(&reference.logical_node)?
            .child_mut(&reference.data_object, reference.fc)
    }
}

/// Address of a data object: `<logical device>/<logical node>.<data object>` plus its constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeReference {
    /// Logical device name
    pub logical_device: String,
    /// Logical node name
    pub logical_node: String,
    /// Data object name
    pub data_object: String,
    /// Functional constraint
    pub fc: FunctionalConstraint,
}

impl NodeReference {
    /// Create a node reference
    pub fn new<A, B, C>(logical_device: A, logical_node: B, data_object: C, fc: FunctionalConstraint) -> Self
    where
        A: Into<String>,
        B: Into<String>,
        C: Into<String>,
    {
        Self {
            logical_device: logical_device.into(),
            logical_node: logical_node.into(),
            data_object: data_object.into(),
            fc,
        }
    }

    /// Parse an object reference such as `ZOWN_RTUPV1/MMXU1.TotW` or `ZOWN_RTUPV1/MMXU1.TotW.mag.f`.
    ///
    /// Attribute names after the data object are ignored.
    pub fn parse(reference: &str, fc: FunctionalConstraint) -> Option<Self> {
        let (logical_device, rest) = reference.split_once('/')?;
        let mut parts = rest.split('.');
        let logical_node = parts.next().filter(|s| !s.is_empty())?;
        let data_object = parts.next().filter(|s| !s.is_empty())?;
        if logical_device.is_empty() {
            return None;
        }
        Some(Self::new(logical_device, logical_node, data_object, fc))
    }
}

impl fmt::Display for NodeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}.{}",
            self.logical_device, self.logical_node, self.data_object
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn total_power() -> ModelNode {
        ModelNode::composite(
            "TotW",
            vec![
                ModelNode::composite("mag", vec![ModelNode::float("f", 12.5)]),
                ModelNode::quality("q", 0),
                ModelNode::timestamp("t", Utc.timestamp_opt(1_500_000_000, 0).single()),
            ],
        )
        .with_fc(FunctionalConstraint::MX)
    }

    fn server_model() -> ServerModel {
        ServerModel::new(vec![LogicalDevice::new(
            "ZOWN_RTUPV1",
            vec![LogicalNode::new("MMXU1", vec![total_power()])],
        )])
    }

    #[test]
    fn test_functional_constraint_parse() {
        assert_eq!("MX".parse::<FunctionalConstraint>().unwrap(), FunctionalConstraint::MX);
        assert_eq!(FunctionalConstraint::CO.to_string(), "CO");
        assert!("XX".parse::<FunctionalConstraint>().is_err());
    }

    #[test]
    fn test_find_by_path() {
        let node = total_power();
        assert_eq!(node.find("mag.f").and_then(ModelNode::as_float), Some(12.5));
        assert_eq!(node.find("q").and_then(ModelNode::as_quality), Some(0));
        assert!(node.find("mag.i").is_none());
        assert!(node.child("t").and_then(ModelNode::as_timestamp).is_some());
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(ModelNode::boolean("stVal", true).as_f64(), Some(1.0));
        assert_eq!(ModelNode::integer("stVal", 4).as_f64(), Some(4.0));
        assert_eq!(ModelNode::float("f", 0.5).as_f64(), Some(0.5));
        assert_eq!(ModelNode::text("d", "x").as_f64(), None);
    }

    #[test]
    fn test_merge_values() {
        let mut node = total_power();
        let update = ModelNode::composite(
            "TotW",
            vec![
                ModelNode::composite("mag", vec![ModelNode::float("f", 99.0)]),
                ModelNode::quality("q", 4),
                ModelNode::integer("extra", 1),
            ],
        );

        node.merge_values(&update);

        assert_eq!(node.find("mag.f").and_then(ModelNode::as_float), Some(99.0));
        assert_eq!(node.find("q").and_then(ModelNode::as_quality), Some(4));
        assert_eq!(node.find("extra").and_then(ModelNode::as_integer), Some(1));
        assert_eq!(node.fc, Some(FunctionalConstraint::MX));
        assert!(node.is_composite());
    }

    #[test]
    fn test_server_model_lookup() {
        let mut model = server_model();
        let reference = NodeReference::new("ZOWN_RTUPV1", "MMXU1", "TotW", FunctionalConstraint::MX);
        assert!(model.find(&reference).is_some());

        let st = NodeReference::new("ZOWN_RTUPV1", "MMXU1", "TotW", FunctionalConstraint::ST);
        assert!(model.find(&st).is_none());

        if let Some(node) = model.find_mut(&reference).and_then(|n| n.find_mut("mag.f")) {
            node.kind = NodeKind::Float(1.0);
        }
        assert_eq!(
            model.find(&reference).and_then(|n| n.find("mag.f")).and_then(ModelNode::as_float),
            Some(1.0)
        );
    }

    #[test]
    fn test_node_reference_parse() {
        let r = NodeReference::parse("ZOWN_RTUPV1/MMXU1.TotW.mag.f", FunctionalConstraint::MX).unwrap();
        assert_eq!(r.logical_device, "ZOWN_RTUPV1");
        assert_eq!(r.logical_node, "MMXU1");
        assert_eq!(r.data_object, "TotW");
        assert_eq!(r.to_string(), "ZOWN_RTUPV1/MMXU1.TotW");

        assert!(NodeReference::parse("no-slash", FunctionalConstraint::MX).is_none());
        assert!(NodeReference::parse("LD/LLN0", FunctionalConstraint::ST).is_none());
        assert!(NodeReference::parse("/LLN0.Beh", FunctionalConstraint::ST).is_none());
    }

    #[test]
    fn test_model_serde() {
        let json = serde_json::to_string(&total_power()).unwrap();
        let back: ModelNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, total_power());
    }
}

/*!
 * Report types.
 *
 * A report is one asynchronous update sent by a device for an enabled report
 * control block: sequencing and buffering metadata plus the members of the
 * dataset that changed.
 */
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{FunctionalConstraint, ModelNode};

/// Milliseconds between 1970-01-01 and 1984-01-01, the epoch of device entry times
pub const DEVICE_EPOCH_OFFSET_MS: i64 = 441_763_200_000;

/// Convert a device-epoch entry time to Unix milliseconds; `None` when out of range
pub fn device_time_to_unix_millis(entry_time: i64) -> Option<i64> {
    entry_time.checked_add(DEVICE_EPOCH_OFFSET_MS)
}

/// Optional fields the report control block asks the device to include
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptFields {
    /// Sequence number included
    pub sequence_number: bool,
    /// Report time stamp included
    pub report_time_stamp: bool,
    /// Reason for inclusion included
    pub reason_for_inclusion: bool,
    /// Dataset name included
    pub data_set_name: bool,
    /// Data references included
    pub data_reference: bool,
    /// Buffer overflow flag included
    pub buffer_overflow: bool,
    /// Entry id included
    pub entry_id: bool,
    /// Configuration revision included
    pub configuration_revision: bool,
    /// Segmentation included
    pub segmentation: bool,
}

impl OptFields {
    /// Human readable list of the included optional fields
    pub fn info(&self) -> String {
        let flags = [
            (self.sequence_number, "sequence-number"),
            (self.report_time_stamp, "report-time-stamp"),
            (self.reason_for_inclusion, "reason-for-inclusion"),
            (self.data_set_name, "data-set-name"),
            (self.data_reference, "data-reference"),
            (self.buffer_overflow, "buffer-overflow"),
            (self.entry_id, "entry-id"),
            (self.configuration_revision, "conf-revision"),
            (self.segmentation, "segmentation"),
        ];
        describe_flags(&flags)
    }
}

/// Why a member was included in a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCode {
    /// Data change
    pub data_change: bool,
    /// Quality change
    pub quality_change: bool,
    /// Data update
    pub data_update: bool,
    /// Integrity period elapsed
    pub integrity: bool,
    /// General interrogation
    pub general_interrogation: bool,
    /// Application trigger
    pub application_trigger: bool,
}

impl ReasonCode {
    /// Human readable list of the set reasons
    pub fn info(&self) -> String {
        let flags = [
            (self.data_change, "data-change"),
            (self.quality_change, "quality-change"),
            (self.data_update, "data-update"),
            (self.integrity, "integrity"),
            (self.general_interrogation, "general-interrogation"),
            (self.application_trigger, "application-trigger"),
        ];
        describe_flags(&flags)
    }
}

fn describe_flags(flags: &[(bool, &str)]) -> String {
    let set: Vec<&str> = flags
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
    if set.is_empty() {
        "none".to_string()
    } else {
        set.join(", ")
    }
}

/// One member of a report dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMember {
    /// Object reference of the member, e.g. `ZOWN_RTUPV1/LLN0.Beh`
    pub reference: String,
    /// Functional constraint of the member
    pub fc: FunctionalConstraint,
    /// The data object with its current values
    pub node: ModelNode,
}

impl ReportMember {
    /// Create a report member
    pub fn new<S: Into<String>>(reference: S, fc: FunctionalConstraint, node: ModelNode) -> Self {
        Self {
            reference: reference.into(),
            fc,
            node,
        }
    }

    /// Name of the data object
    pub fn name(&self) -> &str {
        &self.node.name
    }
}

/// Dataset carried by a report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    /// Dataset reference
    pub reference: String,
    /// Members in dataset order
    pub members: Vec<ReportMember>,
}

/// An asynchronous report received from a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Report identifier of the control block
    pub rpt_id: String,
    /// Dataset reference, e.g. `ZOWN_RTUPV1/LLN0$Measurements`
    pub data_set_ref: String,
    /// Sequence number
    pub sq_num: Option<u32>,
    /// Sub-sequence number of a segmented report
    pub sub_sq_num: Option<u32>,
    /// Entries were lost in the device buffer
    pub buf_ovfl: bool,
    /// More segments of this report follow
    pub more_segments_follow: bool,
    /// Entry time in milliseconds since the device epoch (1984-01-01)
    pub entry_time: Option<i64>,
    /// Configuration revision of the dataset
    pub conf_rev: Option<u32>,
    /// Entry id of a buffered report, hex encoded
    pub entry_id: Option<String>,
    /// Inclusion bit string over the dataset
    pub inclusion_bit_string: Vec<bool>,
    /// Optional fields descriptor
    pub opt_flds: OptFields,
    /// Reason for inclusion of each included member
    pub reason_codes: Vec<ReasonCode>,
    /// Dataset with the included members
    pub data_set: Option<DataSet>,
}

impl Report {
    /// Entry time in Unix milliseconds
    pub fn entry_time_unix_millis(&self) -> Option<i64> {
        self.entry_time.and_then(device_time_to_unix_millis)
    }

    /// Entry time as a UTC instant
    pub fn entry_time_utc(&self) -> Option<DateTime<Utc>> {
        self.entry_time_unix_millis()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }

    /// Members of the dataset, empty when no dataset was delivered
    pub fn members(&self) -> &[ReportMember] {
        self.data_set
            .as_ref()
            .map(|ds| ds.members.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the report is part of a segmented delivery
    pub fn is_segmented(&self) -> bool {
        self.more_segments_follow || self.sub_sq_num.map_or(false, |n| n > 0)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Report {} [{}]", self.rpt_id, self.data_set_ref)?;
        if let Some(sq_num) = self.sq_num {
            write!(f, " sqNum={}", sq_num)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_conversion() {
        assert_eq!(device_time_to_unix_millis(0), Some(441_763_200_000));
        assert_eq!(device_time_to_unix_millis(1_000), Some(441_763_201_000));
        assert_eq!(device_time_to_unix_millis(i64::MAX), None);

        let report = Report {
            entry_time: Some(0),
            ..Report::default()
        };
        assert_eq!(
            report.entry_time_utc().unwrap().to_rfc3339(),
            "1984-01-01T00:00:00+00:00"
        );
        assert!(Report::default().entry_time_utc().is_none());

        let overflowing = Report {
            entry_time: Some(i64::MAX),
            ..Report::default()
        };
        assert!(overflowing.entry_time_unix_millis().is_none());
        assert!(overflowing.entry_time_utc().is_none());
    }

    #[test]
    fn test_flag_info() {
        let reason = ReasonCode {
            data_change: true,
            integrity: true,
            ..ReasonCode::default()
        };
        assert_eq!(reason.info(), "data-change, integrity");
        assert_eq!(ReasonCode::default().info(), "none");

        let opt = OptFields {
            sequence_number: true,
            segmentation: true,
            ..OptFields::default()
        };
        assert_eq!(opt.info(), "sequence-number, segmentation");
    }

    #[test]
    fn test_members_and_segments() {
        let mut report = Report::default();
        assert!(report.members().is_empty());
        assert!(!report.is_segmented());

        report.data_set = Some(DataSet {
            reference: "ZOWN_RTUPV1/LLN0$Status".to_string(),
            members: vec![ReportMember::new(
                "ZOWN_RTUPV1/LLN0.Beh",
                FunctionalConstraint::ST,
                ModelNode::composite("Beh", vec![ModelNode::integer("stVal", 1)]),
            )],
        });
        report.sub_sq_num = Some(1);

        assert_eq!(report.members().len(), 1);
        assert_eq!(report.members()[0].name(), "Beh");
        assert!(report.is_segmented());
    }

    #[test]
    fn test_display() {
        let report = Report {
            rpt_id: "brcb01".to_string(),
            data_set_ref: "ZOWN_RTUPV1/LLN0$Status".to_string(),
            sq_num: Some(7),
            ..Report::default()
        };
        assert_eq!(report.to_string(), "Report brcb01 [ZOWN_RTUPV1/LLN0$Status] sqNum=7");
    }
}

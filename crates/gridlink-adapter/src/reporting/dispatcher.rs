/*!
 * Report classification and dispatch.
 *
 * The dispatcher recognizes the subsystem a report belongs to from its
 * dataset reference, drops stale or unusable reports, translates the members
 * with the handler of that subsystem and hands the resulting
 * [`GetDataResponse`] to the [`MeasurementSink`].
 */
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use gridlink_core::log_with_fields;
use gridlink_core::types::Id;
use gridlink_devices::Report;

use crate::connection::{DeviceConnection, DeviceSession};
use crate::error::Result;
use crate::reporting::handlers::handler_for;
use crate::reporting::sequence::SequenceState;
use crate::sink::MeasurementSink;
use crate::types::{DeviceClass, GetDataResponse, ReportMetadata};

static DATA_SET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(.*)(RTU|PV|BATTERY|ENGINE|LOAD|CHP|HEAT_BUFFER|GAS_FURNACE|HEAT_PUMP|BOILER)([1-9][0-9]*)/LLN0\$(Status|Measurements)$",
    )
    .expect("dataset reference pattern is valid")
});

/// Kind of dataset a report carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSetKind {
    /// Status values (`ST`)
    Status,
    /// Measured values (`MX`)
    Measurements,
}

/// A dataset reference split into its parts, e.g. `ZOWN_RTUPV1/LLN0$Measurements`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSetReference {
    /// Everything before the class token, usually the server name
    pub prefix: String,
    /// Subsystem class
    pub class: DeviceClass,
    /// Subsystem instance number
    pub instance: u32,
    /// Dataset kind
    pub kind: DataSetKind,
}

impl DataSetReference {
    /// Parse a dataset reference; `None` when it does not name a known subsystem
    pub fn parse(reference: &str) -> Option<Self> {
        let captures = DATA_SET_PATTERN.captures(reference)?;
        let class = captures.get(2)?.as_str().parse().ok()?;
        let instance = captures.get(3)?.as_str().parse().ok()?;
        let kind = match captures.get(4)?.as_str() {
            "Status" => DataSetKind::Status,
            _ => DataSetKind::Measurements,
        };
        Some(Self {
            prefix: captures.get(1)?.as_str().to_string(),
            class,
            instance,
            kind,
        })
    }
}

impl fmt::Display for DataSetReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.prefix, self.class, self.instance)
    }
}

/// Translates reports and forwards the result upstream
#[derive(Debug)]
pub struct ReportDispatcher {
    sink: Arc<dyn MeasurementSink>,
    log_report_details: bool,
}

impl ReportDispatcher {
    /// Create a dispatcher delivering to `sink`
    pub fn new(sink: Arc<dyn MeasurementSink>, log_report_details: bool) -> Self {
        Self {
            sink,
            log_report_details,
        }
    }

    /// Translate a report into the measurements to send upstream.
    ///
    /// Returns `None` when the report is discarded. Nothing here fails: bad
    /// reports and bad members are logged and skipped.
    pub fn translate(&self, sequence: &SequenceState, report: &Report) -> Option<GetDataResponse> {
        let Some(reference) = DataSetReference::parse(&report.data_set_ref) else {
            warn!(
                "Discarding report {}: unrecognized dataset reference {}",
                report.rpt_id, report.data_set_ref
            );
            return None;
        };

        if report.buf_ovfl {
            warn!(
                "Buffer overflow flagged in report {}, reports of {} may have been lost",
                report.rpt_id, reference
            );
        }

        if sequence.is_stale(report.sq_num) {
            warn!(
                "Discarding stale report {} with sequence number {:?}, first new sequence number is {:?}",
                report.rpt_id,
                report.sq_num,
                sequence.first_new_sq_num()
            );
            return None;
        }

        if report.is_segmented() {
            info!(
                "Report {} is segmented (sub sequence number {:?}, more segments follow: {}), dispatching this segment",
                report.rpt_id, report.sub_sq_num, report.more_segments_follow
            );
        }

        let Some(handler) = handler_for(reference.class, reference.instance) else {
            warn!("Discarding report {}: no handler for {}", report.rpt_id, reference);
            return None;
        };

        let members = report.members();
        if members.is_empty() {
            warn!("Discarding report {}: no dataset members", report.rpt_id);
            return None;
        }

        let mut measurements = Vec::with_capacity(members.len());
        for member in members {
            match handler.handle_member(member) {
                Ok(Some(measurement)) => measurements.push(measurement),
                Ok(None) => warn!(
                    "Unsupported member {} in report {} of {}",
                    member.reference, report.rpt_id, reference
                ),
                Err(e) => error!(
                    "Failed to translate member {} in report {}: {}",
                    member.reference, report.rpt_id, e
                ),
            }
        }

        let metadata = ReportMetadata {
            sequence_number: report.sq_num,
            time_stamp: report.entry_time_utc(),
            report_identifier: report.rpt_id.clone(),
        };

        Some(GetDataResponse {
            system_identifiers: vec![handler.create_result(measurements)],
            report: Some(metadata),
        })
    }

    /// Accept a report received on `session`.
    ///
    /// Returns the measurements to deliver, or `None` when the report was
    /// discarded. The members of an accepted report are merged into the cached
    /// model of the session.
    pub fn accept(
        &self,
        device_identification: &Id,
        session: &mut DeviceSession,
        report: &Report,
    ) -> Option<GetDataResponse> {
        if self.log_report_details {
            log_report_details(device_identification, report);
        }

        let response = self.translate(&session.sequence, report)?;

        let merged = session.merge_members(report.members());
        log_with_fields!(
            tracing::Level::DEBUG,
            "Report members merged into the cached model",
            device = %device_identification,
            merged = merged,
            members = report.members().len()
        );

        Some(response)
    }

    /// Hand accepted measurements to the sink
    pub async fn deliver(&self, device_identification: &Id, response: GetDataResponse) -> Result<()> {
        self.sink
            .send_measurements(device_identification, response)
            .await
    }

    /// Process a report received on `connection`.
    ///
    /// The report is accepted under the device lock and delivered after the
    /// lock is released. Returns whether measurements were sent.
    pub async fn process(&self, connection: &DeviceConnection, report: &Report) -> Result<bool> {
        let device_identification = connection.device_identification();
        let accepted = {
            let mut session = connection.lock().await;
            self.accept(device_identification, &mut session, report)
        };
        match accepted {
            Some(response) => {
                self.deliver(device_identification, response).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

fn log_report_details(device_identification: &Id, report: &Report) {
    debug!("Report received from {}", device_identification);
    debug!("  report id: {}", report.rpt_id);
    debug!("  dataset: {}", report.data_set_ref);
    debug!("  configuration revision: {:?}", report.conf_rev);
    debug!("  buffer overflow: {}", report.buf_ovfl);
    debug!("  entry id: {:?}", report.entry_id);
    debug!("  inclusion bit string: {}", bit_string(&report.inclusion_bit_string));
    debug!("  more segments follow: {}", report.more_segments_follow);
    debug!("  sequence number: {:?}", report.sq_num);
    debug!("  sub sequence number: {:?}", report.sub_sq_num);
    match (report.entry_time, report.entry_time_utc()) {
        (Some(raw), Some(time)) => debug!("  entry time: {} ({})", time, raw),
        (Some(raw), None) => debug!("  entry time: {} (out of range)", raw),
        _ => debug!("  entry time: none"),
    }
    for (index, reason) in report.reason_codes.iter().enumerate() {
        debug!("  reason code {}: {}", index, reason.info());
    }
    debug!("  optional fields: {}", report.opt_flds.info());
    for member in report.members() {
        debug!("  member {} [{}]", member.reference, member.fc);
    }
}

fn bit_string(bits: &[bool]) -> String {
    bits.iter().map(|b| if *b { '1' } else { '0' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlink_devices::{DataSet, FunctionalConstraint, ModelNode, ReportMember};

    use crate::sink::ChannelMeasurementSink;

    fn dispatcher() -> ReportDispatcher {
        let (sink, _receiver) = ChannelMeasurementSink::channel(1);
        ReportDispatcher::new(Arc::new(sink), false)
    }

    fn behavior(value: i64) -> ReportMember {
        ReportMember::new(
            "ZOWN_RTUPV3/LLN0.Beh",
            FunctionalConstraint::ST,
            ModelNode::composite("Beh", vec![ModelNode::integer("stVal", value)]),
        )
    }

    fn report(data_set_ref: &str, sq_num: Option<u32>, members: Vec<ReportMember>) -> Report {
        Report {
            rpt_id: "brcb01".to_string(),
            data_set_ref: data_set_ref.to_string(),
            sq_num,
            data_set: Some(DataSet {
                reference: data_set_ref.to_string(),
                members,
            }),
            ..Report::default()
        }
    }

    #[test]
    fn test_parse_reference() {
        let reference = DataSetReference::parse("FooBATTERY2/LLN0$Status").unwrap();
        assert_eq!(reference.prefix, "Foo");
        assert_eq!(reference.class, DeviceClass::Battery);
        assert_eq!(reference.instance, 2);
        assert_eq!(reference.kind, DataSetKind::Status);

        let reference = DataSetReference::parse("ZOWN_RTUHEAT_PUMP12/LLN0$Measurements").unwrap();
        assert_eq!(reference.class, DeviceClass::HeatPump);
        assert_eq!(reference.instance, 12);
        assert_eq!(reference.kind, DataSetKind::Measurements);
    }

    #[test]
    fn test_reject_references() {
        assert!(DataSetReference::parse("FooWIDGET1/LLN0$Status").is_none());
        assert!(DataSetReference::parse("FooPV0/LLN0$Status").is_none());
        assert!(DataSetReference::parse("FooPV1/LLN0$Other").is_none());
        assert!(DataSetReference::parse("FooPV1/MMXU1$Measurements").is_none());
        assert!(DataSetReference::parse("FooPV99999999999/LLN0$Status").is_none());
    }

    #[test]
    fn test_translate() {
        let report = Report {
            entry_time: Some(1_000),
            ..report("X.PV3/LLN0$Measurements", Some(10), vec![behavior(1)])
        };
        let mut sequence = SequenceState::new();
        sequence.initialize(5);

        let response = dispatcher().translate(&sequence, &report).unwrap();
        assert_eq!(response.system_identifiers.len(), 1);
        let system = &response.system_identifiers[0];
        assert_eq!(system.id, 3);
        assert_eq!(system.system_type, "PV");
        assert_eq!(system.measurements.len(), 1);

        let metadata = response.report.unwrap();
        assert_eq!(metadata.sequence_number, Some(10));
        assert_eq!(metadata.report_identifier, "brcb01");
        assert_eq!(
            metadata.time_stamp.map(|t| t.timestamp_millis()),
            Some(441_763_201_000)
        );
    }

    #[test]
    fn test_stale_report_is_discarded() {
        let mut sequence = SequenceState::new();
        sequence.initialize(5);
        let stale = report("X.PV3/LLN0$Measurements", Some(3), vec![behavior(1)]);
        assert!(dispatcher().translate(&sequence, &stale).is_none());
        assert_eq!(sequence.first_new_sq_num(), Some(5));

        let overflow = Report {
            buf_ovfl: true,
            ..report("X.PV3/LLN0$Measurements", Some(5), vec![behavior(1)])
        };
        assert!(dispatcher().translate(&sequence, &overflow).is_some());

        let stale_overflow = Report {
            buf_ovfl: true,
            ..report("X.PV3/LLN0$Measurements", Some(4), vec![behavior(1)])
        };
        assert!(dispatcher().translate(&sequence, &stale_overflow).is_none());
        assert_eq!(sequence.first_new_sq_num(), Some(5));
    }

    #[test]
    fn test_entry_time_out_of_range() {
        let report = Report {
            entry_time: Some(i64::MAX),
            ..report("X.PV3/LLN0$Measurements", Some(1), vec![behavior(1)])
        };
        log_report_details(&Id::from("RTU-0001"), &report);

        let response = dispatcher().translate(&SequenceState::new(), &report).unwrap();
        assert!(response.report.unwrap().time_stamp.is_none());
    }

    #[test]
    fn test_unusable_reports_are_discarded() {
        let sequence = SequenceState::new();
        let dispatcher = dispatcher();

        let unknown = report("FooWIDGET1/LLN0$Status", Some(1), vec![behavior(1)]);
        assert!(dispatcher.translate(&sequence, &unknown).is_none());

        let empty = report("FooPV1/LLN0$Status", Some(1), Vec::new());
        assert!(dispatcher.translate(&sequence, &empty).is_none());

        let no_data_set = Report {
            data_set: None,
            ..report("FooPV1/LLN0$Status", Some(1), Vec::new())
        };
        assert!(dispatcher.translate(&sequence, &no_data_set).is_none());
    }

    #[test]
    fn test_bad_members_are_skipped() {
        let members = vec![
            behavior(1),
            ReportMember::new(
                "ZOWN_RTUPV3/LLN0.Health",
                FunctionalConstraint::ST,
                ModelNode::composite("Health", vec![ModelNode::quality("q", 0)]),
            ),
            ReportMember::new(
                "ZOWN_RTUPV3/GGIO1.Alm1",
                FunctionalConstraint::ST,
                ModelNode::composite("Alm1", vec![ModelNode::boolean("stVal", true)]),
            ),
        ];
        let report = Report {
            more_segments_follow: true,
            sub_sq_num: Some(0),
            ..report("ZOWN_RTUPV3/LLN0$Status", None, members)
        };

        let response = dispatcher()
            .translate(&SequenceState::new(), &report)
            .unwrap();
        let measurements = &response.system_identifiers[0].measurements;
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].node, "Beh");
        assert!(response.report.unwrap().time_stamp.is_none());
    }

    #[test]
    fn test_bit_string() {
        assert_eq!(bit_string(&[true, false, true]), "101");
        assert_eq!(bit_string(&[]), "");
    }
}

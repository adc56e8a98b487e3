use std::sync::Arc;
use std::time::Duration;

use gridlink_adapter::{
    ChannelMeasurementSink, DeviceRequest, DeviceResponse, DeviceResponseHandler, Error, Id,
    RtuDeviceService,
};
use gridlink_core::config::{ConfigBuilder, SharedConfig};
use gridlink_devices::{
    DataSet, FunctionalConstraint, LogicalDevice, LogicalNode, ModelNode, Report, ReportMember,
    ServerModel, SimulatedDeviceClient,
};

/// Prints every command response as JSON
struct PrintingResponseHandler;

impl DeviceResponseHandler for PrintingResponseHandler {
    fn handle_response(&self, response: DeviceResponse) {
        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("Response:\n{}", json),
            Err(e) => println!("Response could not be serialized: {}", e),
        }
    }

    fn handle_connection_failure(&self, error: &Error, response: DeviceResponse) {
        println!("Connection failure for {}: {}", response.device_identification, error);
    }

    fn handle_exception(&self, error: &Error, response: DeviceResponse) {
        println!("Command for {} failed: {}", response.device_identification, error);
    }
}

fn measured(name: &str, value: f32) -> ModelNode {
    ModelNode::composite(
        name,
        vec![
            ModelNode::composite("mag", vec![ModelNode::float("f", value)]),
            ModelNode::quality("q", 0),
            ModelNode::timestamp("t", Some(chrono::Utc::now())),
        ],
    )
    .with_fc(FunctionalConstraint::MX)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    gridlink_core::logging::init_with_filter("info,gridlink_adapter=debug")?;

    // Defaults, overridable through GRIDLINK__... environment variables
    let config = ConfigBuilder::new().with_environment_prefix("gridlink").build()?;

    // A simulated RTU with one PV installation
    println!("Setting up a simulated RTU...");
    let model = ServerModel::new(vec![LogicalDevice::new(
        "ZOWN_RTUPV1",
        vec![
            LogicalNode::new(
                "LLN0",
                vec![ModelNode::composite("Beh", vec![ModelNode::integer("stVal", 1)])
                    .with_fc(FunctionalConstraint::ST)],
            ),
            LogicalNode::new("MMXU1", vec![measured("TotW", 1234.5), measured("Hz", 50.02)]),
        ],
    )]);
    let client = Arc::new(SimulatedDeviceClient::new(model));
    client.set_first_new_sq_num(Some(1)).await;

    let (sink, mut measurements) = ChannelMeasurementSink::channel(16);
    let service = RtuDeviceService::build(SharedConfig::new(config), client.clone(), Arc::new(sink));

    let request = DeviceRequest {
        organisation_identification: Id::from("demo-org"),
        device_identification: Id::from("RTU-DEMO"),
        correlation_uid: Id::new(),
        ip_address: "127.0.0.1".to_string(),
    };

    // Reading the power quality values connects and enables reporting
    println!("Requesting power quality values...");
    service
        .get_pq_values(request.clone(), &PrintingResponseHandler)
        .await;

    // Push a report as the device would
    println!("Simulating a measurement report...");
    let report = Report {
        rpt_id: "urcb01".to_string(),
        data_set_ref: "ZOWN_RTUPV1/LLN0$Measurements".to_string(),
        sq_num: Some(1),
        entry_time: Some(1_200_000_000_000),
        data_set: Some(DataSet {
            reference: "ZOWN_RTUPV1/LLN0$Measurements".to_string(),
            members: vec![ReportMember::new(
                "ZOWN_RTUPV1/MMXU1.TotW",
                FunctionalConstraint::MX,
                measured("TotW", 987.65),
            )],
        }),
        ..Report::default()
    };
    client.push_report(report).await?;

    match tokio::time::timeout(Duration::from_secs(2), measurements.recv()).await {
        Ok(Some((device, response))) => {
            println!("Measurements of {}:\n{}", device, serde_json::to_string_pretty(&response)?);
        }
        _ => println!("No measurements received"),
    }

    // The report values are now part of the cached model
    service.get_pq_values(request, &PrintingResponseHandler).await;

    service.connections().disconnect_all().await;
    println!("Example completed successfully!");
    Ok(())
}

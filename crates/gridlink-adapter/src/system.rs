/*!
 * Per-subsystem get and set operations.
 *
 * Every subsystem behind an RTU lives in its own logical device, named after
 * the server, the class and the instance (`ZOWN_RTUPV1`). A
 * [`SystemService`] reads the data objects of one subsystem and writes its
 * set points; the [`SystemServiceFactory`] picks the service for a system type.
 */
use std::fmt::Debug;

use async_trait::async_trait;
use tracing::{debug, warn};

use gridlink_devices::{DeviceClient, ModelNode, NodeReference, Session};

use crate::error::{Error, Result};
use crate::profile::{profile, split_instance, DataObjectSpec, SystemProfile};
use crate::reporting::handlers::translate_data_object;
use crate::types::{DeviceClass, SetDataSystemIdentifier, SystemFilter, SystemResult};

/// Reads and writes the data objects of one subsystem class
#[async_trait]
pub trait SystemService: Send + Sync + Debug {
    /// Class served
    fn device_class(&self) -> DeviceClass;

    /// Read the measurements selected by `filter`
    async fn get_data(
        &self,
        client: &dyn DeviceClient,
        session: &Session,
        server_name: &str,
        filter: &SystemFilter,
    ) -> Result<SystemResult>;

    /// Write the set points of `system`
    async fn set_data(
        &self,
        client: &dyn DeviceClient,
        session: &Session,
        server_name: &str,
        system: &SetDataSystemIdentifier,
    ) -> Result<()>;
}

/// System service driven by the data object table of a class
#[derive(Debug)]
pub struct ProfileSystemService {
    profile: &'static SystemProfile,
}

impl ProfileSystemService {
    /// Create the service for `class`
    pub fn new(class: DeviceClass) -> Self {
        Self {
            profile: profile(class),
        }
    }

    fn selected<'a>(&'a self, filter: &'a SystemFilter) -> impl Iterator<Item = &'static DataObjectSpec> + 'a {
        self.profile.data_objects.iter().filter(move |spec| {
            filter.all
                || filter
                    .measurement_filters
                    .iter()
                    .any(|f| f.node == split_instance(spec.name).0)
        })
    }
}

#[async_trait]
impl SystemService for ProfileSystemService {
    fn device_class(&self) -> DeviceClass {
        self.profile.class
    }

    async fn get_data(
        &self,
        client: &dyn DeviceClient,
        session: &Session,
        server_name: &str,
        filter: &SystemFilter,
    ) -> Result<SystemResult> {
        let class = self.profile.class;
        let logical_device = class.logical_device(server_name, filter.id);

        if !filter.all {
            for unknown in filter.measurement_filters.iter().filter(|f| {
                !self
                    .profile
                    .data_objects
                    .iter()
                    .any(|spec| split_instance(spec.name).0 == f.node)
            }) {
                warn!("{} has no measurement {}", logical_device, unknown.node);
            }
        }

        let mut measurements = Vec::new();
        for spec in self.selected(filter) {
            let reference = NodeReference::new(&logical_device, spec.logical_node, spec.name, spec.fc);
            let node = client.read_values(session, &reference).await?;
            measurements.push(translate_data_object(&node)?);
        }

        debug!("Read {} measurements from {}", measurements.len(), logical_device);
        Ok(SystemResult::new(filter.id, class, measurements))
    }

    async fn set_data(
        &self,
        client: &dyn DeviceClient,
        session: &Session,
        server_name: &str,
        system: &SetDataSystemIdentifier,
    ) -> Result<()> {
        let logical_device = self.profile.class.logical_device(server_name, system.id);

        // Validate everything before the first write
        let mut writes = Vec::with_capacity(system.set_points.len());
        for set_point in &system.set_points {
            let spec = self.profile.set_point(&set_point.node).ok_or_else(|| {
                Error::validation(format!("{} has no set point {}", logical_device, set_point.node))
            })?;
            let value = set_point.value as f32;
            if !value.is_finite() {
                return Err(Error::validation(format!(
                    "Set point {} of {} is not a finite value: {}",
                    set_point.node, logical_device, set_point.value
                )));
            }
            let node = ModelNode::composite(
                spec.name,
                vec![ModelNode::composite("setMag", vec![ModelNode::float("f", value)])],
            )
            .with_fc(spec.fc);
            let reference = NodeReference::new(&logical_device, spec.logical_node, spec.name, spec.fc);
            writes.push((reference, node));
        }

        for (reference, node) in &writes {
            client.write_values(session, reference, node).await?;
            debug!("Wrote set point {}", reference);
        }
        Ok(())
    }
}

/// Resolves the system service for a system type token
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemServiceFactory;

impl SystemServiceFactory {
    /// Create a factory
    pub fn new() -> Self {
        Self
    }

    /// Service for `system_type`, e.g. `PV`
    pub fn service_for(&self, system_type: &str) -> Result<Box<dyn SystemService>> {
        let class: DeviceClass = system_type.parse()?;
        Ok(Box::new(ProfileSystemService::new(class)))
    }
}

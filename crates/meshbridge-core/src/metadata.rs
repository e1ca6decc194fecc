//! Static per-device metadata overrides.
//!
//! Operators pin a display name and location for a device in the config
//! file.  When the device becomes available the projector compares these with
//! what the controller reports and asks the controller to rename / relocate
//! the node where they differ.
//!
//! ```toml
//! [nodes.1]
//! name = "Gateway"
//! location = "Basement"
//! ```

use std::collections::BTreeMap;

use meshbridge_types::{ControllerCommand, DeviceAddress};
use serde::{Deserialize, Serialize};

use crate::registry::Device;

/// Desired metadata for one device.  Missing fields are not enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "loc", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Read-only mapping from device address to [`NodeMeta`].
///
/// TOML table keys are always strings, so addresses are parsed on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, NodeMeta>")]
pub struct MetadataOverrides {
    nodes: BTreeMap<u32, NodeMeta>,
}

impl TryFrom<BTreeMap<String, NodeMeta>> for MetadataOverrides {
    type Error = String;

    fn try_from(raw: BTreeMap<String, NodeMeta>) -> Result<Self, Self::Error> {
        let nodes = raw
            .into_iter()
            .map(|(key, meta)| match key.trim().parse::<u32>() {
                Ok(address) if address > 0 => Ok((address, meta)),
                _ => Err(format!("node key '{key}' is not a positive device address")),
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { nodes })
    }
}

impl MetadataOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, address: u32, meta: NodeMeta) -> Self {
        self.nodes.insert(address, meta);
        self
    }

    pub fn get(&self, address: DeviceAddress) -> Option<&NodeMeta> {
        self.nodes.get(&address.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Commands needed to bring `device` in line with its override.
    ///
    /// At most one rename and one relocate, and nothing for fields that
    /// already match.
    pub fn corrections(&self, device: &Device) -> Vec<ControllerCommand> {
        let Some(meta) = self.get(device.address()) else {
            return Vec::new();
        };
        let mut commands = Vec::new();
        if let Some(name) = &meta.name
            && device.name.as_ref() != Some(name)
        {
            commands.push(ControllerCommand::SetNodeName {
                address: device.address(),
                name: name.clone(),
            });
        }
        if let Some(location) = &meta.location
            && device.location.as_ref() != Some(location)
        {
            commands.push(ControllerCommand::SetNodeLocation {
                address: device.address(),
                location: location.clone(),
            });
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn overrides() -> MetadataOverrides {
        MetadataOverrides::new().with_node(
            1,
            NodeMeta {
                name: Some("Gateway".into()),
                location: Some("Basement".into()),
            },
        )
    }

    #[test]
    fn no_override_no_corrections() {
        let mut registry = Registry::new();
        let device = registry.upsert_device(DeviceAddress(2));
        assert!(overrides().corrections(device).is_empty());
    }

    #[test]
    fn differing_fields_produce_one_command_each() {
        let mut registry = Registry::new();
        let device = registry.upsert_device(DeviceAddress(1));
        device.name = Some("Controller".into());

        let commands = overrides().corrections(device);
        assert_eq!(
            commands,
            vec![
                ControllerCommand::SetNodeName {
                    address: DeviceAddress(1),
                    name: "Gateway".into()
                },
                ControllerCommand::SetNodeLocation {
                    address: DeviceAddress(1),
                    location: "Basement".into()
                },
            ]
        );
    }

    #[test]
    fn matching_fields_produce_nothing() {
        let mut registry = Registry::new();
        let device = registry.upsert_device(DeviceAddress(1));
        device.name = Some("Gateway".into());
        device.location = Some("Basement".into());
        assert!(overrides().corrections(device).is_empty());
    }

    #[test]
    fn deserializes_from_toml_tables() {
        let raw = r#"
            [1]
            name = "Gateway"
            loc = "KG-Laundry"

            [2]
            name = "Cellar light"
        "#;
        let parsed: MetadataOverrides = toml::from_str(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        let first = parsed.get(DeviceAddress(1)).unwrap();
        assert_eq!(first.location.as_deref(), Some("KG-Laundry"));
        assert!(parsed.get(DeviceAddress(2)).unwrap().location.is_none());
    }

    #[test]
    fn rejects_non_numeric_node_keys() {
        let raw = r#"
            [hallway]
            name = "Lamp"
        "#;
        assert!(toml::from_str::<MetadataOverrides>(raw).is_err());
    }
}

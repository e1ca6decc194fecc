//! [`Registry`] – in-memory table of known devices and their values.
//!
//! The registry is a plain owned value: the bridge coordinator holds the only
//! instance and passes it by reference to the projector and router, so no
//! locking is needed.  Every operation is synchronous.
//!
//! # Merge semantics
//!
//! Both node info and value descriptors are merged field-by-field: a field
//! that is absent (`None`) in an update never clears what the registry already
//! holds.

use std::collections::BTreeMap;

use meshbridge_types::{
    BridgeError, DeviceAddress, NodeInfo, NodeState, Scalar, ValueDescriptor, ValueId,
};

/// A single datapoint on a device.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    id: ValueId,
    pub value: Option<Scalar>,
    pub label: Option<String>,
    pub units: Option<String>,
    pub genre: Option<String>,
    pub read_only: bool,
    pub help: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Value {
    fn new(id: ValueId) -> Self {
        Self {
            id,
            value: None,
            label: None,
            units: None,
            genre: None,
            read_only: false,
            help: None,
            min: None,
            max: None,
        }
    }

    /// Identity of this value.  Fixed at creation.
    pub fn id(&self) -> ValueId {
        self.id
    }

    fn merge(&mut self, update: ValueDescriptor) {
        if update.value.is_some() {
            self.value = update.value;
        }
        if update.label.is_some() {
            self.label = update.label;
        }
        if update.units.is_some() {
            self.units = update.units;
        }
        if update.genre.is_some() {
            self.genre = update.genre;
        }
        if let Some(read_only) = update.read_only {
            self.read_only = read_only;
        }
        if update.help.is_some() {
            self.help = update.help;
        }
        if update.min.is_some() {
            self.min = update.min;
        }
        if update.max.is_some() {
            self.max = update.max;
        }
    }
}

/// A node in the mesh network.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    address: DeviceAddress,
    pub state: NodeState,
    pub name: Option<String>,
    pub location: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub product_type: Option<String>,
    pub node_type: Option<String>,
    values: BTreeMap<ValueId, Value>,
}

impl Device {
    fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            state: NodeState::Added,
            name: None,
            location: None,
            manufacturer: None,
            product: None,
            product_type: None,
            node_type: None,
            values: BTreeMap::new(),
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Merge controller-reported node info.  Absent fields are left alone.
    pub fn merge_info(&mut self, info: NodeInfo) {
        if info.name.is_some() {
            self.name = info.name;
        }
        if info.location.is_some() {
            self.location = info.location;
        }
        if info.manufacturer.is_some() {
            self.manufacturer = info.manufacturer;
        }
        if info.product.is_some() {
            self.product = info.product;
        }
        if info.product_type.is_some() {
            self.product_type = info.product_type;
        }
        if info.node_type.is_some() {
            self.node_type = info.node_type;
        }
    }

    pub fn value(&self, id: &ValueId) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }
}

/// Table of devices keyed by address.
#[derive(Debug, Default)]
pub struct Registry {
    devices: BTreeMap<DeviceAddress, Device>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the device at `address`, creating it in the `added` state if it
    /// is not known yet.  An existing device is returned untouched.
    pub fn upsert_device(&mut self, address: DeviceAddress) -> &mut Device {
        self.devices
            .entry(address)
            .or_insert_with(|| Device::new(address))
    }

    /// Delete the device at `address` together with all of its values.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownDevice`] when nothing is registered there.
    pub fn remove_device(&mut self, address: DeviceAddress) -> Result<Device, BridgeError> {
        self.devices
            .remove(&address)
            .ok_or(BridgeError::UnknownDevice(address))
    }

    pub fn device(&self, address: DeviceAddress) -> Result<&Device, BridgeError> {
        self.devices
            .get(&address)
            .ok_or(BridgeError::UnknownDevice(address))
    }

    pub fn device_mut(&mut self, address: DeviceAddress) -> Result<&mut Device, BridgeError> {
        self.devices
            .get_mut(&address)
            .ok_or(BridgeError::UnknownDevice(address))
    }

    /// Merge `update` into the value it identifies, creating the value on
    /// first sight.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownDevice`] when the owning device is not
    /// registered.
    pub fn upsert_value(&mut self, update: ValueDescriptor) -> Result<&Value, BridgeError> {
        let id = update.id;
        let device = self.device_mut(id.address)?;
        let value = device.values.entry(id).or_insert_with(|| Value::new(id));
        value.merge(update);
        Ok(value)
    }

    /// Remove a value.  Returns `Ok(None)` when the device exists but the
    /// value does not.
    pub fn remove_value(&mut self, id: &ValueId) -> Result<Option<Value>, BridgeError> {
        Ok(self.device_mut(id.address)?.values.remove(id))
    }

    /// Look up a value by its full identity.
    pub fn value(&self, id: &ValueId) -> Option<&Value> {
        self.devices.get(&id.address)?.value(id)
    }

    pub fn contains(&self, address: DeviceAddress) -> bool {
        self.devices.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

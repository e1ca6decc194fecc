//! Bus topic layout.
//!
//! | Topic | Direction | Payload |
//! |---|---|---|
//! | `{prefix}/connected` | out, retained | `"1"` / `"2"` (`"0"` as last will) |
//! | `{prefix}/status/{address}/state` | out, retained | lifecycle state |
//! | `{prefix}/status/{address}/name` | out, retained | device name |
//! | `{prefix}/status/{address}/{valueKey}` | out, retained | value JSON |
//! | `{prefix}/set/…` | in | `{"val": …}` |
//! | `{prefix}/cmd/{name}` | in | command specific |

use meshbridge_types::{DeviceAddress, ValueId};

pub const SET_SEGMENT: &str = "set";
pub const CMD_SEGMENT: &str = "cmd";

/// Builds every topic the bridge reads or writes for one instance prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn connected(&self) -> String {
        format!("{}/connected", self.prefix)
    }

    pub fn device_state(&self, address: DeviceAddress) -> String {
        format!("{}/status/{address}/state", self.prefix)
    }

    pub fn device_name(&self, address: DeviceAddress) -> String {
        format!("{}/status/{address}/name", self.prefix)
    }

    pub fn value(&self, id: &ValueId) -> String {
        format!("{}/status/{}/{id}", self.prefix, id.address)
    }

    /// Subscription filters for inbound commands.
    ///
    /// `set/+` carries the single-segment form `set/3-38-1-0`; `set/+/+` the
    /// split form.
    pub fn subscriptions(&self) -> Vec<String> {
        vec![
            format!("{}/{SET_SEGMENT}/+", self.prefix),
            format!("{}/{SET_SEGMENT}/+/+", self.prefix),
            format!("{}/{CMD_SEGMENT}/+", self.prefix),
        ]
    }
}

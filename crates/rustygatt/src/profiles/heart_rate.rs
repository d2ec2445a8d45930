//! Heart Rate profile

use super::{CharacteristicDefinition, DescriptorDefinition, ServiceDefinition};

pub const HEART_RATE_SERVICE_UUID: &str = "0000180d-0000-1000-8000-00805f9b34fb";
pub const HEART_RATE_MEASUREMENT_UUID: &str = "00002a37-0000-1000-8000-00805f9b34fb";
pub const BODY_SENSOR_LOCATION_UUID: &str = "00002a38-0000-1000-8000-00805f9b34fb";
pub const HEART_RATE_CONTROL_POINT_UUID: &str = "00002a39-0000-1000-8000-00805f9b34fb";

/// Vendor descriptor attached to the measurement characteristic
pub const MEASUREMENT_CONFIG_UUID: &str = "82602902-1a54-426b-9e36-e84c238bc669";

/// Heart Rate service table
pub const HEART_RATE: ServiceDefinition = ServiceDefinition {
    name: "Heart Rate",
    uuid: HEART_RATE_SERVICE_UUID,
    characteristics: &[
        CharacteristicDefinition {
            name: "Heart Rate Measurement",
            uuid: HEART_RATE_MEASUREMENT_UUID,
            value: &[0],
            flags: &["notify"],
            descriptor: Some(DescriptorDefinition {
                uuid: MEASUREMENT_CONFIG_UUID,
                flags: &["read", "write"],
            }),
        },
        CharacteristicDefinition {
            name: "Body Sensor Location",
            uuid: BODY_SENSOR_LOCATION_UUID,
            value: &[0],
            flags: &["read"],
            descriptor: None,
        },
        CharacteristicDefinition {
            name: "Heart Rate Control Point",
            uuid: HEART_RATE_CONTROL_POINT_UUID,
            value: &[0],
            flags: &["write"],
            descriptor: None,
        },
    ],
};

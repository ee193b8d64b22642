//! Built-in device register maps
//!
//! Each profile is a plain list of [`RegisterField`] values. Add a new meter
//! by writing a function returning its descriptor and listing it in
//! [`builtin`].

use crate::error::{MeterError, Result};
use crate::register_map::{DeviceDescriptor, RegisterField, ValueKind};

/// Name of the generic three-phase meter profile
pub const EXAMPLE_METER: &str = "example_meter";

/// Names of all built-in profiles
pub const PROFILES: &[&str] = &[EXAMPLE_METER];

/// Look up a built-in profile by name
pub fn builtin(name: &str) -> Result<DeviceDescriptor> {
    match name {
        EXAMPLE_METER => example_meter(),
        other => Err(MeterError::config(format!(
            "Unknown device profile '{}', available: {}",
            other,
            PROFILES.join(", ")
        ))),
    }
}

/// Generic three-phase energy meter
pub fn example_meter() -> Result<DeviceDescriptor> {
    DeviceDescriptor::new(
        EXAMPLE_METER,
        vec![
            RegisterField::new("voltage_l1", 0, ValueKind::Float32).with_unit("V"),
            RegisterField::new("voltage_l2", 2, ValueKind::Float32).with_unit("V"),
            RegisterField::new("voltage_l3", 4, ValueKind::Float32).with_unit("V"),
            RegisterField::new("current_l1", 6, ValueKind::Float32).with_unit("A"),
            RegisterField::new("current_l2", 8, ValueKind::Float32).with_unit("A"),
            RegisterField::new("current_l3", 10, ValueKind::Float32).with_unit("A"),
            RegisterField::new("active_power", 12, ValueKind::Float32).with_unit("W"),
            RegisterField::new("reactive_power", 14, ValueKind::Float32).with_unit("var"),
            RegisterField::new("power_factor", 16, ValueKind::Int16).with_scale(0.001),
            RegisterField::new("frequency", 17, ValueKind::UInt16)
                .with_scale(0.01)
                .with_unit("Hz"),
            RegisterField::new("import_energy", 256, ValueKind::Float64).with_unit("kWh"),
            RegisterField::new("export_energy", 260, ValueKind::Float64).with_unit("kWh"),
            RegisterField::new("operating_hours", 300, ValueKind::UInt32).with_unit("h"),
            RegisterField::string("serial_number", 500, 8),
        ],
    )
}

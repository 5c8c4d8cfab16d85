//! Device input-mapping engine.
//!
//! Discovers raw input devices, binds them to declarative device definitions
//! and, once per host frame, turns their raw signals into named logical values
//! and script-trigger events. See [`Manager`] for the entry point.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod catalog;
pub mod channel;
pub mod config;
pub mod definition;
pub mod device;
pub mod error;
pub mod manager;
pub mod matcher;
pub mod metadata;
pub mod pattern;
pub mod records;
pub mod snapshot;
pub mod source;
pub mod toggle;

pub use catalog::DeviceCatalog;
pub use config::MapperConfig;
pub use definition::{
    Combine, DeviceTypeDefinition, KeyCode, LogicalValueDefinition, RawSourceKind, ValueSourceDefinition,
};
pub use device::RawDevice;
pub use error::{BindError, ConfigError, DefinitionError, DeviceError};
pub use manager::Manager;
pub use metadata::RawDeviceInfo;
pub use snapshot::{DeviceValues, Snapshot};

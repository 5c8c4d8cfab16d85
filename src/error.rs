//! Error types.
//!
//! Nothing in the mapping engine is fatal: definition problems are skipped,
//! binding failures surface as `false` from the `bind_*` calls, and missing
//! hardware reads as neutral. These enums carry the detail for logging and for
//! callers that use the `try_*` variants.

use thiserror::Error;

/// Problems found while turning declarative records into definitions.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// A required attribute (`name`, `index`, `keycode`, ...) is absent.
    #[error("missing required attribute `{attribute}` in {context}")]
    MissingAttribute {
        attribute: &'static str,
        context: String,
    },

    /// An attribute is present but cannot be read as a number.
    #[error("attribute `{attribute}` in {context} is not a valid number: {value}")]
    InvalidNumber {
        attribute: &'static str,
        context: String,
        value: String,
    },

    /// Hat sources need `axis = "horizontal" | "vertical"`.
    #[error("unknown hat axis `{0}` (expected `horizontal` or `vertical`)")]
    UnknownHatAxis(String),

    /// A toggle source declared an explicitly empty value list.
    #[error("toggle source in {0} has an empty value list")]
    EmptyToggleValues(String),

    /// The record does not have the expected shape.
    #[error("malformed record in {context}: {source}")]
    Malformed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML syntax error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON syntax error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read definition file: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures from the device backends.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No enumerated device carries this index.
    #[error("no raw device at index {0}")]
    NotFound(usize),

    /// The report descriptor could not be read or decoded.
    #[error("unusable report descriptor: {0}")]
    Descriptor(String),

    #[cfg(feature = "hid")]
    #[error("HID backend error: {0}")]
    Hid(#[from] hidapi::HidError),
}

/// Reasons a bind attempt did not produce a bound device.
#[derive(Debug, Error)]
pub enum BindError {
    /// A logical id is never silently re-bound.
    #[error("logical device {0} is already bound")]
    AlreadyBound(u32),

    /// None of the candidate types matched live hardware.
    #[error("no device type matched for logical device {0}")]
    NoMatch(u32),

    /// The requested type name is not in the catalog.
    #[error("device type `{0}` is not defined")]
    UnknownType(String),
}

/// Failures loading [`MapperConfig`](crate::config::MapperConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

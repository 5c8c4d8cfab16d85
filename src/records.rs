//! Declarative definition records.
//!
//! Device definitions are written as TOML (or JSON with the same shape), one
//! document per device family:
//!
//! ```toml
//! [[device]]
//! name = "TestPad"
//!
//! [[device.identify]]
//! slot = 0
//! patterns = ["TestPad*"]
//!
//! [[device.value]]
//! name = "roll"
//!   [[device.value.source]]
//!   kind = "axis"
//!   index = 0
//!   dead_zone = 0.1
//!   range = [-1.0, 1.0]
//!
//! [[device.trigger]]
//! name = "fire_script"
//!   [[device.trigger.source]]
//!   kind = "button"
//!   index = 1
//! ```
//!
//! Parsing is a pure function from the document to [`DeviceTypeDefinition`]s.
//! Each device, identify, value, trigger and source entry is decoded on its
//! own, so a malformed entry is skipped (and reported in
//! [`ParsedDocument::skipped`]) without losing its siblings.

use crate::channel::HatAxis;
use crate::definition::{
    clamp_dead_zone, upsert, Combine, DeviceTypeDefinition, LogicalValueDefinition, RawSourceKind,
    ValueSourceDefinition, NO_SLOT,
};
use crate::error::DefinitionError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Numbers may be written bare or quoted; the legacy format stored every
/// attribute as a string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
enum NumberAttr {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberAttr {
    fn as_f64(&self, attribute: &'static str, context: &str) -> Result<f64, DefinitionError> {
        match self {
            NumberAttr::Int(i) => Ok(*i as f64),
            NumberAttr::Float(f) => Ok(*f),
            NumberAttr::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid(attribute, context, s)),
        }
    }

    fn as_i64(&self, attribute: &'static str, context: &str) -> Result<i64, DefinitionError> {
        match self {
            NumberAttr::Int(i) => Ok(*i),
            NumberAttr::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            NumberAttr::Float(f) => Err(invalid(attribute, context, &f.to_string())),
            NumberAttr::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(hex) => i64::from_str_radix(hex, 16),
                    None => s.parse::<i64>(),
                };
                parsed.map_err(|_| invalid(attribute, context, s))
            }
        }
    }

    fn as_f32(&self, attribute: &'static str, context: &str) -> Result<f32, DefinitionError> {
        self.as_f64(attribute, context).map(|v| v as f32)
    }

    fn as_int<T: TryFrom<i64>>(&self, attribute: &'static str, context: &str) -> Result<T, DefinitionError> {
        let raw = self.as_i64(attribute, context)?;
        T::try_from(raw).map_err(|_| invalid(attribute, context, &raw.to_string()))
    }
}

fn invalid(attribute: &'static str, context: &str, value: &str) -> DefinitionError {
    DefinitionError::InvalidNumber {
        attribute,
        context: context.to_string(),
        value: value.to_string(),
    }
}

fn missing(attribute: &'static str, context: &str) -> DefinitionError {
    DefinitionError::MissingAttribute {
        attribute,
        context: context.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct DeviceRecord {
    name: Option<String>,
    #[serde(default)]
    identify: Vec<Value>,
    #[serde(default)]
    value: Vec<Value>,
    #[serde(default)]
    trigger: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct IdentifyRecord {
    slot: Option<NumberAttr>,
    #[serde(default)]
    patterns: Vec<String>,
    pattern: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValueRecord {
    name: Option<String>,
    #[serde(default)]
    source: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    kind: Option<String>,
    index: Option<NumberAttr>,
    keycode: Option<NumberAttr>,
    slot: Option<NumberAttr>,
    dead_zone: Option<NumberAttr>,
    range: Option<[NumberAttr; 2]>,
    #[serde(default)]
    multiply: bool,
    values: Option<Vec<NumberAttr>>,
    axis: Option<String>,
}

/// Result of parsing one document.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    /// Successfully built definitions, in document order.
    pub definitions: Vec<DeviceTypeDefinition>,
    /// Entries that were dropped, with the reason.
    pub skipped: Vec<DefinitionError>,
}

/// Parse a TOML definition document.
///
/// Only a syntax error fails the whole document; bad entries are skipped.
pub fn parse_toml(text: &str) -> Result<ParsedDocument, DefinitionError> {
    let root: Value = toml::from_str(text)?;
    Ok(parse_value(&root))
}

/// Parse a JSON definition document (same shape as the TOML form).
pub fn parse_json(text: &str) -> Result<ParsedDocument, DefinitionError> {
    let root: Value = serde_json::from_str(text)?;
    Ok(parse_value(&root))
}

/// Build definitions from an already-decoded document tree.
pub fn parse_value(root: &Value) -> ParsedDocument {
    let mut doc = ParsedDocument::default();

    let Some(table) = root.as_object() else {
        doc.skipped.push(DefinitionError::Malformed {
            context: "document root".into(),
            source: serde::de::Error::custom("expected a table"),
        });
        return doc;
    };

    for (key, entry) in table {
        if key != "device" {
            warn!(key = %key, "ignoring unknown top-level entry in device definitions");
            continue;
        }
        // A single `[device]` table is accepted as well as `[[device]]`.
        let entries = match entry {
            Value::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };
        for (i, item) in entries.iter().enumerate() {
            match build_device(item, i, &mut doc.skipped) {
                Ok(def) => match doc.definitions.iter_mut().find(|d| d.name == def.name) {
                    Some(existing) => *existing = def,
                    None => doc.definitions.push(def),
                },
                Err(e) => skip(&mut doc.skipped, e),
            }
        }
    }

    doc
}

fn skip(skipped: &mut Vec<DefinitionError>, error: DefinitionError) {
    warn!(error = %error, "skipping device definition entry");
    skipped.push(error);
}

fn decode<T: DeserializeOwned>(value: &Value, context: &str) -> Result<T, DefinitionError> {
    T::deserialize(value).map_err(|source| DefinitionError::Malformed {
        context: context.to_string(),
        source,
    })
}

fn build_device(
    value: &Value,
    position: usize,
    skipped: &mut Vec<DefinitionError>,
) -> Result<DeviceTypeDefinition, DefinitionError> {
    let context = format!("device #{position}");
    let record: DeviceRecord = decode(value, &context)?;
    let name = record
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| missing("name", &context))?;
    let context = format!("device `{name}`");

    let mut def = DeviceTypeDefinition::new(name);

    for (i, entry) in record.identify.iter().enumerate() {
        match build_identify(entry, &format!("{context} identify #{i}")) {
            Ok((slot, patterns)) => def.identify.entry(slot).or_default().extend(patterns),
            Err(e) => skip(skipped, e),
        }
    }

    for (i, entry) in record.value.iter().enumerate() {
        match build_logical(entry, &format!("{context} value #{i}"), skipped) {
            Ok(v) => upsert(&mut def.values, v),
            Err(e) => skip(skipped, e),
        }
    }

    for (i, entry) in record.trigger.iter().enumerate() {
        match build_logical(entry, &format!("{context} trigger #{i}"), skipped) {
            Ok(t) => upsert(&mut def.triggers, t),
            Err(e) => skip(skipped, e),
        }
    }

    Ok(def)
}

fn build_identify(value: &Value, context: &str) -> Result<(i32, Vec<String>), DefinitionError> {
    let record: IdentifyRecord = decode(value, context)?;
    let slot = match &record.slot {
        Some(attr) => attr.as_int::<i32>("slot", context)?,
        None => 0,
    };
    let mut patterns = record.patterns;
    patterns.extend(record.pattern);
    if patterns.is_empty() {
        return Err(missing("patterns", context));
    }
    Ok((slot, patterns))
}

fn build_logical(
    value: &Value,
    context: &str,
    skipped: &mut Vec<DefinitionError>,
) -> Result<LogicalValueDefinition, DefinitionError> {
    let record: ValueRecord = decode(value, context)?;
    let name = record
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| missing("name", context))?;
    let context = format!("{context} `{name}`");

    let mut logical = LogicalValueDefinition::new(name);
    for (i, entry) in record.source.iter().enumerate() {
        match build_source(entry, &format!("{context} source #{i}")) {
            Ok(Some(source)) => logical.sources.push(source),
            Ok(None) => {}
            Err(e) => skip(skipped, e),
        }
    }
    Ok(logical)
}

/// `Ok(None)` for unknown source kinds, which are ignored.
fn build_source(value: &Value, context: &str) -> Result<Option<ValueSourceDefinition>, DefinitionError> {
    let record: SourceRecord = decode(value, context)?;
    let kind_name = record.kind.as_deref().ok_or_else(|| missing("kind", context))?;

    let index = || -> Result<u16, DefinitionError> {
        record
            .index
            .as_ref()
            .ok_or_else(|| missing("index", context))?
            .as_int::<u16>("index", context)
    };
    let keycode = || -> Result<u32, DefinitionError> {
        record
            .keycode
            .as_ref()
            .ok_or_else(|| missing("keycode", context))?
            .as_int::<u32>("keycode", context)
    };

    let kind = match kind_name.trim().to_ascii_lowercase().as_str() {
        "button" => RawSourceKind::Button { index: index()? },
        "axis" => RawSourceKind::Axis { index: index()? },
        "hat" => {
            let axis = match record.axis.as_deref().map(str::trim) {
                Some(a) if a.eq_ignore_ascii_case("horizontal") || a.eq_ignore_ascii_case("h") => {
                    HatAxis::Horizontal
                }
                Some(a) if a.eq_ignore_ascii_case("vertical") || a.eq_ignore_ascii_case("v") => {
                    HatAxis::Vertical
                }
                Some(other) => return Err(DefinitionError::UnknownHatAxis(other.to_string())),
                None => return Err(missing("axis", context)),
            };
            RawSourceKind::Hat {
                index: index()?,
                axis,
            }
        }
        "toggle_button" => RawSourceKind::ToggleButton { index: index()? },
        "state_key" => RawSourceKind::StateKey { keycode: keycode()? },
        "toggle_key" => RawSourceKind::ToggleKey { keycode: keycode()? },
        other => {
            warn!(kind = %other, context = %context, "ignoring unknown source kind");
            return Ok(None);
        }
    };

    let slot = match &record.slot {
        Some(attr) => attr.as_int::<i32>("slot", context)?,
        None if kind.is_key() => NO_SLOT,
        None => 0,
    };

    let mut source = ValueSourceDefinition::new(slot, kind);

    if let Some(dz) = &record.dead_zone {
        source.dead_zone = clamp_dead_zone(dz.as_f32("dead_zone", context)?);
    }
    if let Some([lo, hi]) = &record.range {
        source.range = (lo.as_f32("range", context)?, hi.as_f32("range", context)?);
    }
    if record.multiply {
        source.combine = Combine::Multiplicative;
    }
    if kind.is_toggle() {
        if let Some(values) = &record.values {
            if values.is_empty() {
                return Err(DefinitionError::EmptyToggleValues(context.to_string()));
            }
            source.toggle_values = values
                .iter()
                .map(|v| v.as_f32("values", context))
                .collect::<Result<_, _>>()?;
        }
    }

    Ok(Some(source))
}

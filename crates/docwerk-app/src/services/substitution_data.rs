// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Substitution data files — a JSON object mapping tag keys to values.
//
// A value is either text or an image reference:
//
//   { "Name": "Ada\\nLovelace",
//     "Logo": { "image": "logo.png", "width": 30, "height": 10, "unit": "mm" } }
//
// Numbers and booleans are taken as their text form, `null` as empty text.
// Image paths are resolved against the data file's directory. Without a
// width and height an image is sized by its own pixel dimensions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use docwerk_core::error::{DocwerkError, Result};
use docwerk_template::{ImagePayload, LengthUnit, SubstitutionValue, Substitutions};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    Image(ImageSpec),
    Null,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageSpec {
    image: PathBuf,
    width: Option<f64>,
    height: Option<f64>,
    #[serde(default)]
    unit: UnitSpec,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum UnitSpec {
    #[default]
    Px,
    Mm,
}

impl From<UnitSpec> for LengthUnit {
    fn from(unit: UnitSpec) -> Self {
        match unit {
            UnitSpec::Px => LengthUnit::Pixels,
            UnitSpec::Mm => LengthUnit::Millimeters,
        }
    }
}

/// Read a data file into substitutions.
pub fn load(path: &Path) -> Result<Substitutions> {
    let json = std::fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse(&json, base)
}

/// Parse data JSON, resolving relative image paths against `base`.
pub fn parse(json: &str, base: &Path) -> Result<Substitutions> {
    let entries: BTreeMap<String, DataValue> = serde_json::from_str(json)
        .map_err(|err| DocwerkError::InvalidData(format!("malformed data file: {}", err)))?;

    let mut substitutions = Substitutions::new();
    for (key, value) in entries {
        let value = match value {
            DataValue::Text(text) => SubstitutionValue::Text(text),
            DataValue::Number(number) => SubstitutionValue::Text(number.to_string()),
            DataValue::Flag(flag) => SubstitutionValue::Text(flag.to_string()),
            DataValue::Null => SubstitutionValue::default(),
            DataValue::Image(spec) => SubstitutionValue::Image(image_payload(&key, spec, base)?),
        };
        substitutions.insert(key, value);
    }

    debug!(keys = substitutions.len(), "Substitution data parsed");
    Ok(substitutions)
}

fn image_payload(key: &str, spec: ImageSpec, base: &Path) -> Result<ImagePayload> {
    let path = if spec.image.is_absolute() {
        spec.image
    } else {
        base.join(spec.image)
    };
    let bytes = std::fs::read(&path).map_err(|err| {
        DocwerkError::InvalidData(format!("image for {key} at {}: {}", path.display(), err))
    })?;

    match (spec.width, spec.height) {
        (Some(width), Some(height)) => {
            Ok(ImagePayload::new(bytes, width, height, spec.unit.into()))
        }
        (None, None) => ImagePayload::from_encoded(bytes)
            .map_err(|err| DocwerkError::ImageError(format!("image for {key}: {err}"))),
        _ => Err(DocwerkError::InvalidData(format!(
            "image for {key} needs both width and height, or neither"
        ))),
    }
}

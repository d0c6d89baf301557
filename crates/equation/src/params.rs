//! Configuration: parameters, named properties and keyword lists

use crate::error::{EquationError, Result};
use bandcalc_core::ScalarType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Property holding the equation text
pub const EQUATION_PROPERTY: &str = "Equation";
/// Property selecting the output storage type
pub const OUTPUT_SCALAR_TYPE_PROPERTY: &str = "Output scalar type";

/// Keyword-list key (after the prefix) for the equation
pub const EQUATION_KW: &str = "equation";
/// Keyword-list key (after the prefix) for the output storage type
pub const OUTPUT_SCALAR_TYPE_KW: &str = "output_scalar_type";

/// Engine parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquationParams {
    /// Equation text; empty means pass input 0 through
    pub equation: String,
    /// Storage type the result is narrowed to
    pub output_scalar_type: ScalarType,
}

impl EquationParams {
    pub fn new(equation: impl Into<String>) -> Self {
        Self {
            equation: equation.into(),
            ..Default::default()
        }
    }

    pub fn with_output_scalar_type(mut self, scalar_type: ScalarType) -> Self {
        self.output_scalar_type = scalar_type;
        self
    }

    /// Names accepted by [`property`](Self::property) and
    /// [`set_property`](Self::set_property)
    pub fn property_names() -> [&'static str; 2] {
        [EQUATION_PROPERTY, OUTPUT_SCALAR_TYPE_PROPERTY]
    }

    pub fn property(&self, name: &str) -> Option<Property> {
        match name {
            EQUATION_PROPERTY => Some(Property::Text {
                name: EQUATION_PROPERTY,
                value: self.equation.clone(),
            }),
            OUTPUT_SCALAR_TYPE_PROPERTY => Some(Property::Choice {
                name: OUTPUT_SCALAR_TYPE_PROPERTY,
                value: self.output_scalar_type.name().to_string(),
                choices: ScalarType::ALL.iter().map(|st| st.name()).collect(),
            }),
            _ => None,
        }
    }

    /// Set a property from its string value. Unknown scalar type names
    /// select `ossim_float64`.
    pub fn set_property(&mut self, name: &str, value: &str) -> Result<()> {
        match name {
            EQUATION_PROPERTY => self.equation = value.to_string(),
            OUTPUT_SCALAR_TYPE_PROPERTY => {
                self.output_scalar_type = ScalarType::from_name(value).unwrap_or_default();
            }
            _ => return Err(EquationError::UnknownProperty(name.to_string())),
        }
        Ok(())
    }

    /// Write `<prefix>equation` and `<prefix>output_scalar_type`
    pub fn save_state(&self, kwl: &mut Keywordlist, prefix: &str) {
        kwl.add(prefix, EQUATION_KW, &self.equation);
        kwl.add(prefix, OUTPUT_SCALAR_TYPE_KW, self.output_scalar_type.name());
    }

    /// Read back what [`save_state`](Self::save_state) wrote; missing keys
    /// leave the current value alone.
    pub fn load_state(&mut self, kwl: &Keywordlist, prefix: &str) {
        if let Some(equation) = kwl.find(prefix, EQUATION_KW) {
            self.equation = equation.to_string();
        }
        if let Some(name) = kwl.find(prefix, OUTPUT_SCALAR_TYPE_KW) {
            self.output_scalar_type = ScalarType::from_name(name).unwrap_or_default();
        }
    }
}

/// A named, string-valued setting exposed to a host application
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Text {
        name: &'static str,
        value: String,
    },
    /// Enumerated string; `value` is one of `choices`
    Choice {
        name: &'static str,
        value: String,
        choices: Vec<&'static str>,
    },
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::Text { name, .. } | Property::Choice { name, .. } => *name,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Property::Text { value, .. } | Property::Choice { value, .. } => value,
        }
    }

    pub fn choices(&self) -> &[&'static str] {
        match self {
            Property::Text { .. } => &[],
            Property::Choice { choices, .. } => choices,
        }
    }
}

/// Flat `key: value` store used to persist engine state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keywordlist(BTreeMap<String, String>);

impl Keywordlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `<prefix><key>`, replacing any existing value
    pub fn add(&mut self, prefix: &str, key: &str, value: &str) {
        self.0.insert(format!("{prefix}{key}"), value.to_string());
    }

    pub fn find(&self, prefix: &str, key: &str) -> Option<&str> {
        self.0.get(&format!("{prefix}{key}")).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse `key: value` lines; blank lines and `//` comments are skipped
    pub fn parse(text: &str) -> Self {
        let mut kwl = Self::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some((key, value)) = line.split_once(':') {
                kwl.add("", key.trim(), value.trim());
            }
        }
        kwl
    }
}

impl fmt::Display for Keywordlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.0 {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties() {
        let mut params = EquationParams::default();
        params.set_property(EQUATION_PROPERTY, "im[0] * 2").unwrap();
        params
            .set_property(OUTPUT_SCALAR_TYPE_PROPERTY, "ossim_uint8")
            .unwrap();
        assert_eq!(params.equation, "im[0] * 2");
        assert_eq!(params.output_scalar_type, ScalarType::UInt8);

        let prop = params.property(OUTPUT_SCALAR_TYPE_PROPERTY).unwrap();
        assert_eq!(prop.value(), "ossim_uint8");
        assert_eq!(prop.choices().len(), 8);
        assert!(prop.choices().contains(&"ossim_float32"));
        assert!(params.property("Bogus").is_none());
        assert!(matches!(
            params.set_property("Bogus", "1"),
            Err(EquationError::UnknownProperty(_))
        ));
    }

    #[test]
    fn test_unknown_scalar_type_is_float64() {
        let mut params = EquationParams::default().with_output_scalar_type(ScalarType::UInt16);
        params
            .set_property(OUTPUT_SCALAR_TYPE_PROPERTY, "complex128")
            .unwrap();
        assert_eq!(params.output_scalar_type, ScalarType::Float64);
    }

    #[test]
    fn test_keywordlist_round_trip() {
        let params = EquationParams::new("max(im[0], im[1])")
            .with_output_scalar_type(ScalarType::SInt16);
        let mut kwl = Keywordlist::new();
        params.save_state(&mut kwl, "combiner.");
        assert_eq!(kwl.find("combiner.", "equation"), Some("max(im[0], im[1])"));

        let reparsed = Keywordlist::parse(&kwl.to_string());
        let mut loaded = EquationParams::default();
        loaded.load_state(&reparsed, "combiner.");
        assert_eq!(loaded, params);
    }

    #[test]
    fn test_load_state_keeps_missing_keys() {
        let mut params = EquationParams::new("1");
        params.load_state(&Keywordlist::new(), "");
        assert_eq!(params.equation, "1");
    }
}

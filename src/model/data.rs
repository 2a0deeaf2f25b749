//! This module defines data objects, their typed values, and data associations.
//!
//! Every value kind has exactly one textual encoding, used both when reading
//! `flowable:value` and when writing it back.

use chrono::NaiveDateTime;

use crate::xml::parse_bool;

/// Textual format of date values
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// The value kinds a data object may carry, selected by its structure reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    String,
    Boolean,
    Date,
    Double,
    Int,
    Long,
    Json,
}

impl DataKind {
    /// Resolve a structure reference such as `xsd:long`; the prefix is ignored
    pub fn from_structure_ref(structure_ref: &str) -> Option<Self> {
        let local = structure_ref
            .rsplit_once(':')
            .map_or(structure_ref, |(_, local)| local);
        match local.to_ascii_lowercase().as_str() {
            "string" => Some(DataKind::String),
            "boolean" => Some(DataKind::Boolean),
            "datetime" | "date" => Some(DataKind::Date),
            "double" => Some(DataKind::Double),
            "int" | "integer" => Some(DataKind::Int),
            "long" => Some(DataKind::Long),
            "json" => Some(DataKind::Json),
            _ => None,
        }
    }

    /// Canonical structure reference written for this kind
    pub fn structure_ref(&self) -> &'static str {
        match self {
            DataKind::String => "xsd:string",
            DataKind::Boolean => "xsd:boolean",
            DataKind::Date => "xsd:datetime",
            DataKind::Double => "xsd:double",
            DataKind::Int => "xsd:int",
            DataKind::Long => "xsd:long",
            DataKind::Json => "xsd:json",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataKind::String => "string",
            DataKind::Boolean => "boolean",
            DataKind::Date => "datetime",
            DataKind::Double => "double",
            DataKind::Int => "int",
            DataKind::Long => "long",
            DataKind::Json => "json",
        }
    }

    /// Decode `text` as a value of this kind; `None` when the text does not fit the kind.
    ///
    /// String values are kept verbatim, every other kind ignores surrounding whitespace.
    pub fn parse(&self, text: &str) -> Option<DataValue> {
        let trimmed = text.trim();
        match self {
            DataKind::String => Some(DataValue::String(text.to_string())),
            DataKind::Boolean => parse_bool("dataObject", "value", trimmed).ok().map(DataValue::Boolean),
            DataKind::Date => NaiveDateTime::parse_from_str(trimmed, DATE_FORMAT)
                .ok()
                .map(DataValue::Date),
            DataKind::Double => trimmed.parse().ok().map(DataValue::Double),
            DataKind::Int => trimmed.parse().ok().map(DataValue::Int),
            DataKind::Long => trimmed.parse().ok().map(DataValue::Long),
            DataKind::Json => serde_json::from_str(trimmed).ok().map(DataValue::Json),
        }
    }
}

/// A typed data object value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    String(String),
    Boolean(bool),
    Date(NaiveDateTime),
    Double(f64),
    Int(i32),
    Long(i64),
    Json(serde_json::Value),
}

impl DataValue {
    pub fn kind(&self) -> DataKind {
        match self {
            DataValue::String(_) => DataKind::String,
            DataValue::Boolean(_) => DataKind::Boolean,
            DataValue::Date(_) => DataKind::Date,
            DataValue::Double(_) => DataKind::Double,
            DataValue::Int(_) => DataKind::Int,
            DataValue::Long(_) => DataKind::Long,
            DataValue::Json(_) => DataKind::Json,
        }
    }

    /// The canonical textual encoding of the value
    pub fn encode(&self) -> String {
        match self {
            DataValue::String(s) => s.clone(),
            DataValue::Boolean(b) => b.to_string(),
            DataValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            // Debug keeps the fractional part of whole numbers, "2.0" rather than "2"
            DataValue::Double(d) => format!("{:?}", d),
            DataValue::Int(i) => i.to_string(),
            DataValue::Long(l) => l.to_string(),
            DataValue::Json(json) => json.to_string(),
        }
    }
}

/// A `from`/`to` expression pair inside a data association
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assignment {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Moves data between an activity and a data object or store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataAssociation {
    pub id: Option<String>,
    pub source_ref: Option<String>,
    pub target_ref: Option<String>,
    /// `None` when absent, `Some("")` when present but empty
    pub transformation: Option<String>,
    pub assignments: Vec<Assignment>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn long_values_keep_their_literal() {
        let kind = DataKind::from_structure_ref("xsd:long").unwrap();
        let value = kind.parse("-123456").unwrap();
        assert_eq!(value, DataValue::Long(-123456));
        assert_eq!(value.encode(), "-123456");
    }

    #[test]
    fn dates_use_the_fixed_format() {
        let value = DataKind::Date.parse("2013-09-16T11:23:00").unwrap();
        assert_eq!(value.encode(), "2013-09-16T11:23:00");
    }

    #[test]
    fn doubles_keep_a_fractional_part() {
        assert_eq!(DataKind::Double.parse("2").unwrap().encode(), "2.0");
        assert_eq!(DataKind::Double.parse("123456789.0").unwrap().encode(), "123456789.0");
    }

    #[test]
    fn structure_refs_are_case_insensitive() {
        assert_eq!(DataKind::from_structure_ref("xsd:dateTime"), Some(DataKind::Date));
        assert_eq!(DataKind::from_structure_ref("custom"), None);
    }

    #[test]
    fn json_objects_keep_their_key_order() {
        let value = DataKind::Json.parse(r#"{"b":1,"a":[true,null],"c":{"z":0,"y":"x"}}"#).unwrap();
        assert_eq!(value.encode(), r#"{"b":1,"a":[true,null],"c":{"z":0,"y":"x"}}"#);
    }

    #[test]
    fn string_values_are_not_trimmed() {
        let value = DataKind::String.parse("  padded value ").unwrap();
        assert_eq!(value.encode(), "  padded value ");
    }

    #[test]
    fn booleans_ignore_case_like_attributes() {
        assert_eq!(DataKind::Boolean.parse("TRUE"), Some(DataValue::Boolean(true)));
        assert_eq!(DataKind::Boolean.parse(" False "), Some(DataValue::Boolean(false)));
    }

    #[test]
    fn mistyped_text_is_rejected() {
        assert_eq!(DataKind::Int.parse("abc"), None);
        assert_eq!(DataKind::Boolean.parse("yes"), None);
    }
}

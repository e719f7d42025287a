//! Destination column metadata returned by catalog introspection.

use serde::{Deserialize, Serialize};

/// Storage class of a column, derived from `INFORMATION_SCHEMA.COLUMNS.DATA_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    Integer,
    Decimal,
    Float,
    Bit,
    Year,
    Char,
    VarChar,
    TinyText,
    Text,
    MediumText,
    LongText,
    Binary,
    Blob,
    Date,
    DateTime,
    Time,
    Enum,
    Json,
    Other,
}

impl StorageClass {
    /// Classify a MySQL `DATA_TYPE` string.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.to_lowercase().as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                StorageClass::Integer
            }
            "decimal" | "numeric" => StorageClass::Decimal,
            "float" | "double" | "real" => StorageClass::Float,
            "bit" | "bool" | "boolean" => StorageClass::Bit,
            "year" => StorageClass::Year,
            "char" => StorageClass::Char,
            "varchar" => StorageClass::VarChar,
            "tinytext" => StorageClass::TinyText,
            "text" => StorageClass::Text,
            "mediumtext" => StorageClass::MediumText,
            "longtext" => StorageClass::LongText,
            "binary" | "varbinary" => StorageClass::Binary,
            "tinyblob" | "blob" | "mediumblob" | "longblob" => StorageClass::Blob,
            "date" => StorageClass::Date,
            "datetime" | "timestamp" => StorageClass::DateTime,
            "time" => StorageClass::Time,
            "enum" | "set" => StorageClass::Enum,
            "json" => StorageClass::Json,
            _ => StorageClass::Other,
        }
    }

    /// Numeric-family classes accept a synthesized `0`.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            StorageClass::Integer
                | StorageClass::Decimal
                | StorageClass::Float
                | StorageClass::Bit
                | StorageClass::Year
        )
    }

    /// Rank among the TEXT classes, `None` for everything else.
    pub fn text_rank(&self) -> Option<u8> {
        match self {
            StorageClass::TinyText => Some(1),
            StorageClass::Text => Some(2),
            StorageClass::MediumText => Some(3),
            StorageClass::LongText => Some(4),
            _ => None,
        }
    }

    /// True for character columns narrower than LONGTEXT.
    pub fn is_narrow_text(&self) -> bool {
        matches!(self, StorageClass::Char | StorageClass::VarChar)
            || self.text_rank().is_some_and(|rank| rank < 4)
    }

    /// TEXT classes report capacity in bytes; CHAR/VARCHAR report characters.
    pub fn is_byte_limited(&self) -> bool {
        self.text_rank().is_some()
    }
}

/// A column declared NOT NULL without a default, so every insert must supply it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredColumn {
    pub name: String,
    pub storage_class: StorageClass,
}

impl RequiredColumn {
    pub fn new(name: impl Into<String>, storage_class: StorageClass) -> Self {
        Self {
            name: name.into(),
            storage_class,
        }
    }
}

/// Storage class and capacity of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Raw `DATA_TYPE` as reported by the catalog.
    pub data_type: String,
    pub storage_class: StorageClass,
    /// `CHARACTER_MAXIMUM_LENGTH`; `None` for non-character columns.
    pub max_length: Option<u64>,
}

impl ColumnInfo {
    pub fn new(data_type: impl Into<String>, max_length: Option<u64>) -> Self {
        let data_type = data_type.into();
        Self {
            storage_class: StorageClass::from_data_type(&data_type),
            data_type,
            max_length,
        }
    }

    /// Measure a value in the unit this column's capacity is expressed in.
    pub fn measure(&self, value: &str) -> usize {
        if self.storage_class.is_byte_limited() {
            value.len()
        } else {
            value.chars().count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(StorageClass::from_data_type("INT"), StorageClass::Integer);
        assert_eq!(StorageClass::from_data_type("tinyint"), StorageClass::Integer);
        assert_eq!(StorageClass::from_data_type("mediumtext"), StorageClass::MediumText);
        assert_eq!(StorageClass::from_data_type("datetime"), StorageClass::DateTime);
        assert_eq!(StorageClass::from_data_type("geometry"), StorageClass::Other);
    }

    #[test]
    fn test_numeric_family() {
        for t in ["int", "bigint", "decimal", "double", "bit", "year"] {
            assert!(StorageClass::from_data_type(t).is_numeric(), "{}", t);
        }
        for t in ["varchar", "text", "datetime", "enum", "blob"] {
            assert!(!StorageClass::from_data_type(t).is_numeric(), "{}", t);
        }
    }

    #[test]
    fn test_narrow_text() {
        assert!(StorageClass::Text.is_narrow_text());
        assert!(StorageClass::MediumText.is_narrow_text());
        assert!(StorageClass::VarChar.is_narrow_text());
        assert!(!StorageClass::LongText.is_narrow_text());
        assert!(!StorageClass::Integer.is_narrow_text());
    }

    #[test]
    fn test_measure_units() {
        let text = ColumnInfo::new("text", Some(65535));
        let varchar = ColumnInfo::new("varchar", Some(255));
        assert_eq!(text.measure("가나"), 6);
        assert_eq!(varchar.measure("가나"), 2);
    }
}

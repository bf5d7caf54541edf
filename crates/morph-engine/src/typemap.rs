//! Field type to physical column mapping.
//!
//! ```text
//!   STR  ──►  varchar(150)  nullable
//!   NUM  ──►  integer       nullable
//!   BOOL ──►  boolean       nullable
//! ```
//!
//! Every column is nullable so that a type change leaves existing rows
//! readable as NULL.

use std::collections::BTreeMap;

use morph_common::{FieldType, MAX_NAME_LENGTH, MAX_STRING_LENGTH};
use morph_storage::{ColumnDef, StorageType};

use crate::error::{EngineError, EngineResult};

/// Physical column type for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnType {
    /// Storage type.
    pub storage_type: StorageType,
    /// Whether NULL is allowed.
    pub nullable: bool,
}

impl ColumnType {
    /// Builds the storage column definition for a field named `name`.
    pub fn column(&self, name: impl Into<String>) -> ColumnDef {
        ColumnDef::new(name, self.storage_type, self.nullable)
    }
}

/// Maps a field type to its physical column type.
pub fn physical_type(field_type: FieldType) -> ColumnType {
    let storage_type = match field_type {
        FieldType::String => StorageType::Varchar {
            max_length: MAX_STRING_LENGTH,
        },
        FieldType::Number => StorageType::Integer,
        FieldType::Boolean => StorageType::Boolean,
    };
    ColumnType {
        storage_type,
        nullable: true,
    }
}

/// Maps a stored catalog token to its field and column type.
///
/// A token outside the vocabulary means the catalog is corrupt.
pub fn physical_type_for_token(
    table: &str,
    field: &str,
    token: &str,
) -> EngineResult<(FieldType, ColumnType)> {
    FieldType::from_token(token)
        .map(|ft| (ft, physical_type(ft)))
        .ok_or_else(|| EngineError::UnknownFieldType {
            table: table.to_string(),
            field: field.to_string(),
            token: token.to_string(),
        })
}

/// Checks a field name against the catalog limits.
pub fn validate_field_name(name: &str) -> EngineResult<()> {
    if name.is_empty() {
        return Err(EngineError::invalid_request(
            "Field names may not be blank.",
        ));
    }
    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(EngineError::invalid_field(
            name,
            format!(
                "Ensure this field name has at most {} characters (it has {}).",
                MAX_NAME_LENGTH, length
            ),
        ));
    }
    Ok(())
}

/// Parses a client field declaration map of `name -> token`.
///
/// Fields are checked in name order and the first invalid one is reported.
pub fn parse_field_types(
    fields: &BTreeMap<String, String>,
) -> EngineResult<BTreeMap<String, FieldType>> {
    fields
        .iter()
        .map(|(name, token)| {
            validate_field_name(name)?;
            let field_type = FieldType::from_token(token).ok_or_else(|| {
                EngineError::invalid_field(name, format!("\"{}\" is not a valid choice.", token))
            })?;
            Ok((name.clone(), field_type))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(n, t)| (n.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn test_physical_type() {
        assert_eq!(
            physical_type(FieldType::String).storage_type,
            StorageType::Varchar { max_length: 150 }
        );
        assert_eq!(
            physical_type(FieldType::Number).storage_type,
            StorageType::Integer
        );
        assert_eq!(
            physical_type(FieldType::Boolean).storage_type,
            StorageType::Boolean
        );
        assert!(FieldType::ALL.iter().all(|t| physical_type(*t).nullable));
    }

    #[test]
    fn test_physical_type_for_token() {
        let (ft, ct) = physical_type_for_token("t", "age", "NUM").unwrap();
        assert_eq!(ft, FieldType::Number);
        assert_eq!(ct.column("age"), ColumnDef::nullable("age", StorageType::Integer));

        let err = physical_type_for_token("t", "age", "DATE").unwrap_err();
        assert!(matches!(err, EngineError::UnknownFieldType { ref token, .. } if token == "DATE"));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_parse_field_types() {
        let parsed = parse_field_types(&decl(&[("name", "STR"), ("age", "NUM")])).unwrap();
        assert_eq!(
            parsed.into_iter().collect::<Vec<_>>(),
            vec![
                ("age".to_string(), FieldType::Number),
                ("name".to_string(), FieldType::String)
            ]
        );
    }

    #[test]
    fn test_parse_unknown_token() {
        let err = parse_field_types(&decl(&[("name", "FOO")])).unwrap_err();
        match err {
            EngineError::Validation { field, message } => {
                assert_eq!(field.as_deref(), Some("name"));
                assert_eq!(message, "\"FOO\" is not a valid choice.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_field_name_limits() {
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name(&"x".repeat(255)).is_ok());
        assert!(matches!(
            validate_field_name(&"x".repeat(256)),
            Err(EngineError::Validation { field: Some(_), .. })
        ));
    }
}

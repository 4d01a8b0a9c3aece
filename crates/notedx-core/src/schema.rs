//! Table layout shared by the note store and the tabular corpus loader.

use arrow::datatypes::Schema;
use thiserror::Error;

pub const NOTE_ID: &str = "note_id";
pub const NOTE_TEXT: &str = "note_text";
pub const LABEL: &str = "label";

/// Columns every labelled corpus must carry.
pub const REQUIRED_CORPUS_COLUMNS: &[&str] = &[NOTE_TEXT, LABEL];

/// DDL for the note store. Idempotent, safe to run before every operation.
pub const CREATE_TABLES_SQL: &str = "
CREATE TABLE IF NOT EXISTS notes (
    note_id BIGINT PRIMARY KEY,
    note_text VARCHAR NOT NULL,
    label VARCHAR
);
CREATE SEQUENCE IF NOT EXISTS predictions_pred_id_seq START 1;
CREATE TABLE IF NOT EXISTS predictions (
    pred_id BIGINT PRIMARY KEY DEFAULT nextval('predictions_pred_id_seq'),
    note_id BIGINT NOT NULL,
    predicted_label VARCHAR NOT NULL,
    proba_json VARCHAR,
    created_at TIMESTAMP DEFAULT current_timestamp
);
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("null value in required column '{column}' at row {row}")]
    NullValue { column: String, row: usize },

    #[error("column '{column}' cannot be read as {expected}: {reason}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        reason: String,
    },
}

/// Fail on the first name in `required` that `schema` does not contain.
pub fn require_columns(schema: &Schema, required: &[&str]) -> Result<(), SchemaError> {
    for &name in required {
        if schema.index_of(name).is_err() {
            return Err(SchemaError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::{DataType, Field};

    #[test]
    fn corpus_schema_passes() {
        let schema = Schema::new(vec![
            Field::new(NOTE_ID, DataType::Int64, false),
            Field::new(NOTE_TEXT, DataType::Utf8, false),
            Field::new(LABEL, DataType::Utf8, true),
        ]);
        assert!(require_columns(&schema, REQUIRED_CORPUS_COLUMNS).is_ok());
    }

    #[test]
    fn names_the_missing_column() {
        let schema = Schema::new(vec![Field::new(NOTE_TEXT, DataType::Utf8, false)]);
        assert_eq!(
            require_columns(&schema, REQUIRED_CORPUS_COLUMNS),
            Err(SchemaError::MissingColumn("label".into()))
        );

        let schema = Schema::new(vec![Field::new(LABEL, DataType::Utf8, false)]);
        let err = require_columns(&schema, REQUIRED_CORPUS_COLUMNS).unwrap_err();
        assert_eq!(err.to_string(), "missing required column 'note_text'");
    }

    #[test]
    fn ddl_declares_both_tables() {
        assert!(CREATE_TABLES_SQL.contains("CREATE TABLE IF NOT EXISTS notes"));
        assert!(CREATE_TABLES_SQL.contains("CREATE TABLE IF NOT EXISTS predictions"));
    }
}

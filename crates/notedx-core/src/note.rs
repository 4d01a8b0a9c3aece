//! Clinical notes and per-note prediction results.
//!
//! Notes arrive either as CSV rows or as store rows; both are read through
//! Arrow RecordBatches and extracted with [`notes_from_batches`].

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::schema::{self, SchemaError};

/// A single clinical note. `label` is `None` for unlabelled (inference) rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub text: String,
    pub label: Option<String>,
}

impl Note {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            label: None,
        }
    }

    pub fn labelled(id: i64, text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            label: Some(label.into()),
        }
    }
}

/// Label and, when the model supports it, the probability of every class.
///
/// `probabilities` follows the model's class order and sums to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    pub probabilities: Option<Vec<(String, f64)>>,
}

impl PredictionResult {
    pub fn label_only(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            probabilities: None,
        }
    }

    /// Probability assigned to `label`, if probabilities are available.
    pub fn probability(&self, label: &str) -> Option<f64> {
        self.probabilities
            .as_ref()?
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }

    /// Probabilities sorted by descending value (stable for ties).
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .probabilities
            .iter()
            .flatten()
            .map(|(l, p)| (l.as_str(), *p))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Extract notes from RecordBatches with `note_text` and `label` columns.
///
/// `note_id` is optional; rows without one are numbered by position across
/// all batches. Null labels become `None`; a null `note_text` is an error.
/// Columns of other types are cast (numeric labels become strings).
pub fn notes_from_batches(batches: &[RecordBatch]) -> Result<Vec<Note>, SchemaError> {
    let mut notes = Vec::new();
    let mut offset = 0usize;

    for batch in batches {
        schema::require_columns(&batch.schema(), schema::REQUIRED_CORPUS_COLUMNS)?;

        let text_col = string_column(batch, schema::NOTE_TEXT)?;
        let label_col = string_column(batch, schema::LABEL)?;
        let id_col = match batch.column_by_name(schema::NOTE_ID) {
            Some(col) => Some(int_column(col, schema::NOTE_ID)?),
            None => None,
        };

        for row in 0..batch.num_rows() {
            let global_row = offset + row;
            if text_col.is_null(row) {
                return Err(SchemaError::NullValue {
                    column: schema::NOTE_TEXT.into(),
                    row: global_row,
                });
            }

            let id = match &id_col {
                Some(ids) if ids.is_null(row) => {
                    return Err(SchemaError::NullValue {
                        column: schema::NOTE_ID.into(),
                        row: global_row,
                    });
                }
                Some(ids) => ids.value(row),
                None => global_row as i64,
            };

            let label = (!label_col.is_null(row)).then(|| label_col.value(row).to_string());

            notes.push(Note {
                id,
                text: text_col.value(row).to_string(),
                label,
            });
        }
        offset += batch.num_rows();
    }

    Ok(notes)
}

// ── Arrow extraction helpers ──

fn string_column(batch: &RecordBatch, name: &str) -> Result<StringArray, SchemaError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
    let utf8 = cast_column(col, name, &DataType::Utf8, "text")?;
    utf8.as_any()
        .downcast_ref::<StringArray>()
        .cloned()
        .ok_or_else(|| SchemaError::UnexpectedType {
            column: name.to_string(),
            expected: "text",
            reason: format!("cast produced {:?}", utf8.data_type()),
        })
}

fn int_column(col: &ArrayRef, name: &str) -> Result<Int64Array, SchemaError> {
    let ints = cast_column(col, name, &DataType::Int64, "integer")?;
    ints.as_any()
        .downcast_ref::<Int64Array>()
        .cloned()
        .ok_or_else(|| SchemaError::UnexpectedType {
            column: name.to_string(),
            expected: "integer",
            reason: format!("cast produced {:?}", ints.data_type()),
        })
}

fn cast_column(
    col: &ArrayRef,
    name: &str,
    to: &DataType,
    expected: &'static str,
) -> Result<ArrayRef, SchemaError> {
    if col.data_type() == to {
        return Ok(col.clone());
    }
    cast(col, to).map_err(|e| SchemaError::UnexpectedType {
        column: name.to_string(),
        expected,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::LargeStringArray;
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    /// Build a corpus batch; `ids` of `None` omits the `note_id` column.
    fn corpus_batch(
        ids: Option<&[i64]>,
        texts: &[Option<&str>],
        labels: &[Option<&str>],
    ) -> RecordBatch {
        let mut fields = Vec::new();
        let mut columns: Vec<ArrayRef> = Vec::new();

        if let Some(ids) = ids {
            fields.push(Field::new("note_id", DataType::Int64, false));
            columns.push(Arc::new(Int64Array::from(ids.to_vec())));
        }
        fields.push(Field::new("note_text", DataType::Utf8, true));
        columns.push(Arc::new(StringArray::from(texts.to_vec())));
        fields.push(Field::new("label", DataType::Utf8, true));
        columns.push(Arc::new(StringArray::from(labels.to_vec())));

        RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).unwrap()
    }

    #[test]
    fn extracts_labelled_notes() {
        let batch = corpus_batch(
            Some(&[10, 11]),
            &[Some("fever and cough"), Some("throbbing headache")],
            &[Some("flu"), Some("migraine")],
        );

        let notes = notes_from_batches(&[batch]).unwrap();
        assert_eq!(
            notes,
            vec![
                Note::labelled(10, "fever and cough", "flu"),
                Note::labelled(11, "throbbing headache", "migraine"),
            ]
        );
    }

    #[test]
    fn null_label_is_none() {
        let batch = corpus_batch(Some(&[1]), &[Some("rash")], &[None]);
        let notes = notes_from_batches(&[batch]).unwrap();
        assert_eq!(notes[0].label, None);
    }

    #[test]
    fn missing_id_column_numbers_rows_across_batches() {
        let b1 = corpus_batch(None, &[Some("a"), Some("b")], &[Some("x"), Some("y")]);
        let b2 = corpus_batch(None, &[Some("c")], &[Some("z")]);

        let notes = notes_from_batches(&[b1, b2]).unwrap();
        let ids: Vec<i64> = notes.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn null_text_names_column_and_row() {
        let b1 = corpus_batch(None, &[Some("a")], &[Some("x")]);
        let b2 = corpus_batch(None, &[Some("b"), None], &[Some("x"), Some("y")]);

        let err = notes_from_batches(&[b1, b2]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NullValue {
                column: "note_text".into(),
                row: 2
            }
        );
    }

    #[test]
    fn missing_label_column_is_fatal() {
        let schema = Schema::new(vec![Field::new("note_text", DataType::Utf8, false)]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![Arc::new(StringArray::from(vec!["cough"]))],
        )
        .unwrap();

        let err = notes_from_batches(&[batch]).unwrap_err();
        assert_eq!(err, SchemaError::MissingColumn("label".into()));
    }

    #[test]
    fn casts_numeric_labels_and_large_text() {
        let schema = Schema::new(vec![
            Field::new("note_text", DataType::LargeUtf8, false),
            Field::new("label", DataType::Int64, false),
        ]);
        let batch = RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(LargeStringArray::from(vec!["chest pain"])),
                Arc::new(Int64Array::from(vec![7])),
            ],
        )
        .unwrap();

        let notes = notes_from_batches(&[batch]).unwrap();
        assert_eq!(notes[0].text, "chest pain");
        assert_eq!(notes[0].label.as_deref(), Some("7"));
    }

    #[test]
    fn empty_batches() {
        assert!(notes_from_batches(&[]).unwrap().is_empty());
    }

    #[test]
    fn prediction_ranking_and_lookup() {
        let result = PredictionResult {
            label: "flu".into(),
            probabilities: Some(vec![
                ("cold".into(), 0.2),
                ("flu".into(), 0.7),
                ("migraine".into(), 0.1),
            ]),
        };
        assert_eq!(result.probability("flu"), Some(0.7));
        assert_eq!(result.probability("asthma"), None);

        let ranked: Vec<&str> = result.ranked().into_iter().map(|(l, _)| l).collect();
        assert_eq!(ranked, vec!["flu", "cold", "migraine"]);
    }

    #[test]
    fn label_only_has_no_ranking() {
        let result = PredictionResult::label_only("flu");
        assert!(result.ranked().is_empty());
        assert_eq!(result.probability("flu"), None);
    }
}

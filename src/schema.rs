//! Column types and the type code codec.
//!
//! A `VARIABLE_TYPES` line declares one type code per column: `T<width>`
//! text, `I` 32-bit integer, `S` 16-bit integer, `N` float, `D<format>` date
//! and `V` for the `*` marker column. [`ColumnType`] is the decoded form;
//! its `Display` impl is the encoder. On export the type of each dataframe
//! column is inferred with [`infer_column_type`], which measures text widths
//! from the values actually being written.

use crate::constants::{
    DEFAULT_DATE_FORMAT, MIN_TEXT_WIDTH, MODEL_POINT_HEADER_MARKER, RESULT_HEADER_MARKER,
    SENTINEL_VALUE,
};
use crate::error::{MpfError, Result};
use chrono::format::{Item, StrftimeItems};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage type of a single MPF column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    /// Leading marker column, every value is `*`
    Sentinel,
    /// Free text; the width is the longest value (advisory when decoded)
    Text { max_width: Option<usize> },
    Integer32,
    Integer16,
    Float64,
    /// Calendar date rendered with a strftime pattern
    Date { format: String },
}

impl ColumnType {
    /// Decode a type code such as `T12`, `I` or `D%Y-%m-%d`
    pub fn decode(code: &str) -> Result<Self> {
        let code = code.trim();
        let mut chars = code.chars();
        let Some(tag) = chars.next() else {
            return Err(MpfError::UnknownTypeCode {
                code: code.to_string(),
                column: None,
            });
        };
        let suffix = chars.as_str();

        match tag {
            'V' => Ok(ColumnType::Sentinel),
            'T' => Ok(ColumnType::Text {
                max_width: suffix.trim().parse().ok(),
            }),
            'I' => Ok(ColumnType::Integer32),
            'S' => Ok(ColumnType::Integer16),
            'N' => Ok(ColumnType::Float64),
            'D' => {
                let format = if suffix.is_empty() {
                    DEFAULT_DATE_FORMAT.to_string()
                } else {
                    validate_date_format(suffix)?;
                    suffix.to_string()
                };
                Ok(ColumnType::Date { format })
            }
            _ => Err(MpfError::UnknownTypeCode {
                code: code.to_string(),
                column: None,
            }),
        }
    }

    /// Encoded type code, e.g. `T5`
    pub fn code(&self) -> String {
        self.to_string()
    }

    /// Polars dtype used when reading this column from text
    pub fn reader_dtype(&self) -> DataType {
        match self {
            ColumnType::Sentinel | ColumnType::Text { .. } => DataType::String,
            ColumnType::Integer32 => DataType::Int32,
            ColumnType::Integer16 => DataType::Int16,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Date { .. } => DataType::Date,
        }
    }

    /// Same variant and payload, ignoring text widths
    pub fn same_kind(&self, other: &ColumnType) -> bool {
        match (self, other) {
            (ColumnType::Text { .. }, ColumnType::Text { .. }) => true,
            _ => self == other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Sentinel => write!(f, "V"),
            ColumnType::Text {
                max_width: Some(width),
            } => write!(f, "T{}", width),
            ColumnType::Text { max_width: None } => write!(f, "T"),
            ColumnType::Integer32 => write!(f, "I"),
            ColumnType::Integer16 => write!(f, "S"),
            ColumnType::Float64 => write!(f, "N"),
            ColumnType::Date { format } => write!(f, "D{}", format),
        }
    }
}

impl FromStr for ColumnType {
    type Err = MpfError;

    fn from_str(code: &str) -> Result<Self> {
        ColumnType::decode(code)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = MpfError;

    fn try_from(code: String) -> Result<Self> {
        ColumnType::decode(&code)
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        column_type.code()
    }
}

fn validate_date_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(MpfError::InvalidDateFormat {
            format: format.to_string(),
        });
    }
    Ok(())
}

/// Infer the MPF type of a dataframe column for export
///
/// `date_format` is attached to date columns, since polars dates carry no
/// rendering pattern of their own.
pub fn infer_column_type(column: &Column, date_format: &str) -> Result<ColumnType> {
    let column_type = match column.dtype() {
        DataType::Int16 => ColumnType::Integer16,
        dtype if dtype.is_integer() => ColumnType::Integer32,
        dtype if dtype.is_float() => ColumnType::Float64,
        DataType::Date => ColumnType::Date {
            format: date_format.to_string(),
        },
        DataType::String if is_marker_column(column)? => ColumnType::Sentinel,
        DataType::String => ColumnType::Text {
            max_width: Some(text_width(column)?),
        },
        dtype => {
            return Err(MpfError::UnsupportedColumnType {
                column: column.name().to_string(),
                dtype: dtype.to_string(),
            });
        }
    };
    Ok(column_type)
}

/// Type code for a dataframe column as it will be written
pub fn encode_column(column: &Column, date_format: &str) -> Result<String> {
    infer_column_type(column, date_format).map(|column_type| column_type.code())
}

/// True for the leading `!`/`&` column whose values are all `*`
fn is_marker_column(column: &Column) -> Result<bool> {
    let name = column.name();
    if !name.starts_with([MODEL_POINT_HEADER_MARKER, RESULT_HEADER_MARKER]) {
        return Ok(false);
    }

    Ok(column
        .str()?
        .into_iter()
        .all(|value| value == Some(SENTINEL_VALUE)))
}

/// Longest non-missing value, in characters
fn text_width(column: &Column) -> Result<usize> {
    let width = column
        .str()?
        .into_iter()
        .flatten()
        .map(|value| value.chars().count())
        .max()
        .unwrap_or(0);
    Ok(width.max(MIN_TEXT_WIDTH))
}

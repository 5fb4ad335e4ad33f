//! This module defines the closed set of element types a column can hold.

use arrow_schema::{DataType as ArrowDataType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The element type of an `Array`, or the expected type of a `Field`.
///
/// The integer codes are part of the native ABI and must not be renumbered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Bool,
    Int64,
    Float64,
    String,
    Timestamp,
}

impl DType {
    /// All supported dtypes, in code order.
    pub const ALL: [DType; 5] = [
        DType::Bool,
        DType::Int64,
        DType::Float64,
        DType::String,
        DType::Timestamp,
    ];

    /// The stable code passed across the native boundary.
    pub fn code(self) -> i32 {
        match self {
            DType::Bool => 1,
            DType::Int64 => 2,
            DType::Float64 => 3,
            DType::String => 4,
            DType::Timestamp => 5,
        }
    }

    /// Decodes a native dtype code. Unknown codes yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(DType::Bool),
            2 => Some(DType::Int64),
            3 => Some(DType::Float64),
            4 => Some(DType::String),
            5 => Some(DType::Timestamp),
            _ => None,
        }
    }

    /// Converts an Arrow `DataType` into a `DType`, if it is one the engine produces.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Option<Self> {
        match arrow_type {
            ArrowDataType::Boolean => Some(DType::Bool),
            ArrowDataType::Int64 => Some(DType::Int64),
            ArrowDataType::Float64 => Some(DType::Float64),
            ArrowDataType::Utf8 => Some(DType::String),
            ArrowDataType::Timestamp(TimeUnit::Nanosecond, _) => Some(DType::Timestamp),
            _ => None,
        }
    }

    /// Converts a `DType` into the Arrow `DataType` the engine stores it as.
    pub fn to_arrow_type(self) -> ArrowDataType {
        match self {
            DType::Bool => ArrowDataType::Boolean,
            DType::Int64 => ArrowDataType::Int64,
            DType::Float64 => ArrowDataType::Float64,
            DType::String => ArrowDataType::Utf8,
            DType::Timestamp => ArrowDataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::String => "string",
            DType::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

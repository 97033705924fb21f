//! Column statistics.
//!
//! Every column keeps three copies: per-stride statistics that roll into a
//! row index entry, stripe-wide statistics reset at each stripe, and
//! file-wide statistics merged from the stripe copies at flush. Merging is
//! strict: combining statistics of different families is a corruption
//! error, not a silent no-op.

use crate::error::{Error, Result};
use crate::schema::Category;
use crate::value::Decimal;

/// Statistics for one column over some span of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnStatistics {
    number_of_values: u64,
    has_null: bool,
    typed: TypedStatistics,
}

/// The category-specific part of [`ColumnStatistics`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypedStatistics {
    /// Counts only; used for compound categories.
    Generic,
    /// Integer min/max/sum. The sum drops out on overflow.
    Integer {
        /// Minimum value seen.
        min: Option<i64>,
        /// Maximum value seen.
        max: Option<i64>,
        /// Sum of values, `None` after overflow.
        sum: Option<i64>,
    },
    /// Floating point min/max/sum.
    Double {
        /// Minimum value seen.
        min: Option<f64>,
        /// Maximum value seen.
        max: Option<f64>,
        /// Sum of values.
        sum: f64,
    },
    /// String min/max and total byte length.
    String {
        /// Lexicographically smallest value.
        min: Option<String>,
        /// Lexicographically largest value.
        max: Option<String>,
        /// Total encoded byte length.
        total_length: u64,
    },
    /// Count of true values.
    Boolean {
        /// Number of true values.
        true_count: u64,
    },
    /// Total byte length of binary values.
    Binary {
        /// Total encoded byte length.
        total_length: u64,
    },
    /// Date min/max in days since the epoch.
    Date {
        /// Minimum value seen.
        min: Option<i32>,
        /// Maximum value seen.
        max: Option<i32>,
    },
    /// Timestamp min/max in milliseconds since the epoch.
    Timestamp {
        /// Minimum value seen.
        min: Option<i64>,
        /// Maximum value seen.
        max: Option<i64>,
    },
    /// Decimal min/max.
    Decimal {
        /// Minimum value seen.
        min: Option<Decimal>,
        /// Maximum value seen.
        max: Option<Decimal>,
    },
}

impl ColumnStatistics {
    /// Creates empty statistics of the family matching `category`.
    pub fn new(category: Category) -> Self {
        let typed = match category {
            Category::Boolean => TypedStatistics::Boolean { true_count: 0 },
            Category::Byte | Category::Short | Category::Int | Category::Long => {
                TypedStatistics::Integer { min: None, max: None, sum: Some(0) }
            }
            Category::Float | Category::Double => {
                TypedStatistics::Double { min: None, max: None, sum: 0.0 }
            }
            Category::String | Category::Char | Category::Varchar => {
                TypedStatistics::String { min: None, max: None, total_length: 0 }
            }
            Category::Binary => TypedStatistics::Binary { total_length: 0 },
            Category::Date => TypedStatistics::Date { min: None, max: None },
            Category::Timestamp => TypedStatistics::Timestamp { min: None, max: None },
            Category::Decimal => TypedStatistics::Decimal { min: None, max: None },
            Category::List | Category::Map | Category::Struct | Category::Union => {
                TypedStatistics::Generic
            }
        };
        Self { number_of_values: 0, has_null: false, typed }
    }

    /// Creates statistics from already-known parts, as decoded from a file.
    pub(crate) fn from_parts(number_of_values: u64, has_null: bool, typed: TypedStatistics) -> Self {
        Self { number_of_values, has_null, typed }
    }

    /// The number of non-null values.
    pub fn number_of_values(&self) -> u64 {
        self.number_of_values
    }

    /// True when the span contained at least one null.
    pub fn has_null(&self) -> bool {
        self.has_null
    }

    /// The category-specific statistics.
    pub fn typed(&self) -> &TypedStatistics {
        &self.typed
    }

    /// Records a null row.
    pub fn set_null(&mut self) {
        self.has_null = true;
    }

    /// Records a value of a compound category (struct, list, map, union).
    pub fn update_generic(&mut self) {
        self.number_of_values += 1;
    }

    /// Records an integer value.
    pub fn update_integer(&mut self, value: i64) {
        self.number_of_values += 1;
        if let TypedStatistics::Integer { min, max, sum } = &mut self.typed {
            *min = Some(min.map_or(value, |m| m.min(value)));
            *max = Some(max.map_or(value, |m| m.max(value)));
            *sum = sum.and_then(|s| s.checked_add(value));
        }
    }

    /// Records a floating point value.
    pub fn update_double(&mut self, value: f64) {
        self.number_of_values += 1;
        if let TypedStatistics::Double { min, max, sum } = &mut self.typed {
            *min = Some(min.map_or(value, |m| m.min(value)));
            *max = Some(max.map_or(value, |m| m.max(value)));
            *sum += value;
        }
    }

    /// Records a string value.
    pub fn update_string(&mut self, value: &str) {
        self.number_of_values += 1;
        if let TypedStatistics::String { min, max, total_length } = &mut self.typed {
            if min.as_deref().map_or(true, |m| value < m) {
                *min = Some(value.to_string());
            }
            if max.as_deref().map_or(true, |m| value > m) {
                *max = Some(value.to_string());
            }
            *total_length += value.len() as u64;
        }
    }

    /// Records a boolean value.
    pub fn update_boolean(&mut self, value: bool) {
        self.number_of_values += 1;
        if let TypedStatistics::Boolean { true_count } = &mut self.typed {
            if value {
                *true_count += 1;
            }
        }
    }

    /// Records a binary value's length.
    pub fn update_binary(&mut self, length: u64) {
        self.number_of_values += 1;
        if let TypedStatistics::Binary { total_length } = &mut self.typed {
            *total_length += length;
        }
    }

    /// Records a date value.
    pub fn update_date(&mut self, days: i32) {
        self.number_of_values += 1;
        if let TypedStatistics::Date { min, max } = &mut self.typed {
            *min = Some(min.map_or(days, |m| m.min(days)));
            *max = Some(max.map_or(days, |m| m.max(days)));
        }
    }

    /// Records a timestamp value in epoch milliseconds.
    pub fn update_timestamp(&mut self, millis: i64) {
        self.number_of_values += 1;
        if let TypedStatistics::Timestamp { min, max } = &mut self.typed {
            *min = Some(min.map_or(millis, |m| m.min(millis)));
            *max = Some(max.map_or(millis, |m| m.max(millis)));
        }
    }

    /// Records a decimal value.
    pub fn update_decimal(&mut self, value: Decimal) {
        self.number_of_values += 1;
        if let TypedStatistics::Decimal { min, max } = &mut self.typed {
            if min.map_or(true, |m| value < m) {
                *min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                *max = Some(value);
            }
        }
    }

    /// Folds `other` into `self`. Statistics of different families do not
    /// merge; that mismatch is reported, not ignored.
    pub fn merge(&mut self, other: &ColumnStatistics) -> Result<()> {
        self.number_of_values += other.number_of_values;
        self.has_null |= other.has_null;
        match (&mut self.typed, &other.typed) {
            (TypedStatistics::Generic, TypedStatistics::Generic) => {}
            (
                TypedStatistics::Integer { min, max, sum },
                TypedStatistics::Integer { min: omin, max: omax, sum: osum },
            ) => {
                *min = merge_min(*min, *omin);
                *max = merge_max(*max, *omax);
                *sum = match (*sum, *osum) {
                    (Some(a), Some(b)) => a.checked_add(b),
                    _ => None,
                };
            }
            (
                TypedStatistics::Double { min, max, sum },
                TypedStatistics::Double { min: omin, max: omax, sum: osum },
            ) => {
                *min = merge_min(*min, *omin);
                *max = merge_max(*max, *omax);
                *sum += osum;
            }
            (
                TypedStatistics::String { min, max, total_length },
                TypedStatistics::String { min: omin, max: omax, total_length: olen },
            ) => {
                if let Some(o) = omin {
                    if min.as_deref().map_or(true, |m| o.as_str() < m) {
                        *min = Some(o.clone());
                    }
                }
                if let Some(o) = omax {
                    if max.as_deref().map_or(true, |m| o.as_str() > m) {
                        *max = Some(o.clone());
                    }
                }
                *total_length += olen;
            }
            (
                TypedStatistics::Boolean { true_count },
                TypedStatistics::Boolean { true_count: ocount },
            ) => {
                *true_count += ocount;
            }
            (
                TypedStatistics::Binary { total_length },
                TypedStatistics::Binary { total_length: olen },
            ) => {
                *total_length += olen;
            }
            (
                TypedStatistics::Date { min, max },
                TypedStatistics::Date { min: omin, max: omax },
            ) => {
                *min = merge_min(*min, *omin);
                *max = merge_max(*max, *omax);
            }
            (
                TypedStatistics::Timestamp { min, max },
                TypedStatistics::Timestamp { min: omin, max: omax },
            ) => {
                *min = merge_min(*min, *omin);
                *max = merge_max(*max, *omax);
            }
            (
                TypedStatistics::Decimal { min, max },
                TypedStatistics::Decimal { min: omin, max: omax },
            ) => {
                if let Some(o) = omin {
                    if min.map_or(true, |m| *o < m) {
                        *min = Some(*o);
                    }
                }
                if let Some(o) = omax {
                    if max.map_or(true, |m| *o > m) {
                        *max = Some(*o);
                    }
                }
            }
            _ => {
                return Err(Error::corrupt(
                    "merging column statistics of different families",
                ))
            }
        }
        Ok(())
    }

    /// Clears the statistics for the next span, keeping the family.
    pub fn reset(&mut self) {
        self.number_of_values = 0;
        self.has_null = false;
        self.typed = match self.typed {
            TypedStatistics::Generic => TypedStatistics::Generic,
            TypedStatistics::Integer { .. } => {
                TypedStatistics::Integer { min: None, max: None, sum: Some(0) }
            }
            TypedStatistics::Double { .. } => {
                TypedStatistics::Double { min: None, max: None, sum: 0.0 }
            }
            TypedStatistics::String { .. } => {
                TypedStatistics::String { min: None, max: None, total_length: 0 }
            }
            TypedStatistics::Boolean { .. } => TypedStatistics::Boolean { true_count: 0 },
            TypedStatistics::Binary { .. } => TypedStatistics::Binary { total_length: 0 },
            TypedStatistics::Date { .. } => TypedStatistics::Date { min: None, max: None },
            TypedStatistics::Timestamp { .. } => {
                TypedStatistics::Timestamp { min: None, max: None }
            }
            TypedStatistics::Decimal { .. } => TypedStatistics::Decimal { min: None, max: None },
        };
    }
}

fn merge_min<T: PartialOrd + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y < x { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

fn merge_max<T: PartialOrd + Copy>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y > x { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

//! Rule Matcher
//!
//! Orders a config's rows by environment and finds the first conditional
//! value whose criteria all hold.

use crate::criteria::all_criteria_match;
use crate::error::Result;
use crate::evaluation::{Scope, NO_MATCH};
use crate::types::{ConfigRow, ConfigValue};

/// The outcome of a row scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowMatch<'a> {
    /// Index of the last conditional value examined, or -1
    pub conditional_value_index: i32,
    /// Index (in sorted order) of the matching row, or -1
    pub config_row_index: i32,
    pub value: Option<&'a ConfigValue>,
}

/// Rows scoped to `project_env_id` first; everything else keeps its
/// relative order.
pub fn sort_rows(rows: &[ConfigRow], project_env_id: i64) -> Vec<&ConfigRow> {
    let mut sorted: Vec<&ConfigRow> = rows.iter().collect();
    sorted.sort_by_key(|row| row.project_env_id != Some(project_env_id));
    sorted
}

/// Scan rows in environment order and their values in array order; the
/// first fully matching value wins.
pub fn matching_config_value<'a>(rows: &'a [ConfigRow], scope: &Scope<'_>) -> Result<RowMatch<'a>> {
    let mut conditional_value_index = NO_MATCH;

    for (row_index, row) in sort_rows(rows, scope.project_env_id).into_iter().enumerate() {
        for (value_index, conditional) in row.values.iter().enumerate() {
            conditional_value_index = value_index as i32;

            if all_criteria_match(&conditional.criteria, scope)? {
                // a valueless match ends this row only
                let Some(value) = conditional.value.as_ref() else {
                    break;
                };

                return Ok(RowMatch {
                    conditional_value_index,
                    config_row_index: row_index as i32,
                    value: Some(value),
                });
            }
        }
    }

    Ok(RowMatch {
        conditional_value_index,
        config_row_index: NO_MATCH,
        value: None,
    })
}

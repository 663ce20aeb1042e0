//! Interconnection queue shaping.

use crate::{
    columns::{ColumnMap, QUEUE_COLUMNS, Schema},
    error::SchemaError,
    table::{Table, Value},
};

/// Reshape an operator queue into [`QUEUE_COLUMNS`] followed by `extra`.
///
/// `rename` maps native headers onto queue columns and every source must be
/// present. `missing` lists queue columns the operator does not publish; they
/// are added as nulls and must not already exist. Every column in `extra`
/// must exist after the rename. Anything else is dropped.
pub fn format_interconnection(
    mut table: Table,
    rename: &ColumnMap,
    extra: &[&str],
    missing: &[&str],
) -> Result<Table, SchemaError> {
    if rename.schema() != Schema::InterconnectionQueue {
        return Err(SchemaError::UnknownCanonicalColumn {
            schema: rename.schema().name(),
            target: "interconnection queue".to_string(),
        });
    }
    rename.apply(&mut table)?;
    for name in missing {
        if table.has_column(name) {
            return Err(SchemaError::DuplicateColumn((*name).to_string()));
        }
        table.fill_column(name, Value::Null)?;
    }
    for name in extra {
        table.require(name)?;
    }
    let order: Vec<&str> = QUEUE_COLUMNS.iter().chain(extra).copied().collect();
    let out = table.select(&order)?;
    Schema::InterconnectionQueue.validate(&out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> ColumnMap {
        let pairs: Vec<(&str, &str)> = QUEUE_COLUMNS[..13]
            .iter()
            .map(|c| (*c, *c))
            .chain([("In Service", "Proposed Completion Date"), ("Out", "Withdrawn Date")])
            .collect();
        ColumnMap::new(Schema::InterconnectionQueue, &pairs).unwrap()
    }

    fn raw() -> Table {
        let cols: Vec<&str> = QUEUE_COLUMNS[..13]
            .iter()
            .copied()
            .chain(["In Service", "Out", "Fuel", "Noise"])
            .collect();
        let row = cols.iter().map(|c| Value::text(*c)).collect();
        Table::from_rows(cols, vec![row]).unwrap()
    }

    #[test]
    fn fills_missing_and_keeps_extras() {
        let out = format_interconnection(
            raw(),
            &map(),
            &["Fuel"],
            &["Withdrawal Comment", "Actual Completion Date"],
        )
        .unwrap();
        assert_eq!(out.columns().len(), QUEUE_COLUMNS.len() + 1);
        assert_eq!(out.columns().last().map(String::as_str), Some("Fuel"));
        assert!(!out.has_column("Noise"));
        let row = out.row(0).unwrap();
        assert_eq!(row.get("Withdrawal Comment"), Some(&Value::Null));
        assert_eq!(row.get("Withdrawn Date"), Some(&Value::Text("Out".into())));
    }

    #[test]
    fn missing_column_that_exists_is_rejected() {
        let err = format_interconnection(raw(), &map(), &[], &["Status", "Withdrawal Comment"])
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("Status".into()));
    }

    #[test]
    fn unknown_extra_is_rejected() {
        let err = format_interconnection(
            raw(),
            &map(),
            &["Nope"],
            &["Withdrawal Comment", "Actual Completion Date"],
        )
        .unwrap_err();
        assert_eq!(err, SchemaError::missing("Nope"));
    }
}

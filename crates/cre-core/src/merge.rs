//! Relationship and match-key merges.
//!
//! A relationship dataset references its parent indirectly: each row names
//! a parent column and the value that column must hold. Joining therefore
//! runs in stages: a cheap match-key pre-filter, a domain gate, progressive
//! per-name filtering, a re-sort, and finally an outer join on the resolved
//! column pair.
//!
//! Join keys are typed: a numeric value and a textual value never compare
//! equal unless both columns qualified for numeric reconciliation first.

use std::collections::{BTreeMap, HashMap, HashSet};

use polars::prelude::{AnyValue, Column, DataFrame, DataType, Series};
use tracing::warn;

use cre_data::{
    any_to_f64, any_to_string, column_names, column_string_values, column_value_string,
    dtype_is_numeric, filter_rows, format_numeric, sort_rows_by_columns,
};
use cre_model::{EngineError, RelationshipDescriptor, Result};

/// Domain-identifying column of a parent dataset.
pub const DOMAIN_COLUMN: &str = "DOMAIN";
/// Referenced-domain column of a relationship dataset.
pub const REFERENCE_DOMAIN_COLUMN: &str = "RDOMAIN";
/// Referencing-variable column of a relationship dataset.
pub const IDENTIFIER_VARIABLE_COLUMN: &str = "IDVAR";
/// Subject-reference column of relationship datasets keyed to DM.
pub const SUBJECT_REFERENCE_COLUMN: &str = "RSUBJID";
/// Subject identifier column.
pub const SUBJECT_COLUMN: &str = "USUBJID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Full,
}

/// Merges a parent dataset with a relationship dataset that references it
/// indirectly. The surviving parent rows satisfy the match keys, the
/// domain gate, and every referencing-variable constraint; the final frame
/// is the outer join of those rows with the full child dataset.
pub fn merge_relationship_datasets(
    parent: &DataFrame,
    parent_keys: &[String],
    child: &DataFrame,
    child_keys: &[String],
    descriptor: &RelationshipDescriptor,
) -> Result<DataFrame> {
    let columns = &descriptor.relationship_columns;
    let result = filter_by_match_keys(parent, parent_keys, child, child_keys)?;
    let result = filter_by_reference_domain(&result, child)?;
    let result =
        filter_by_reference_columns(&result, child, &columns.name_column, &columns.value_column)?;
    merge_on_relationship_columns(
        &result,
        child,
        &descriptor.domain_name,
        &columns.name_column,
        &columns.value_column,
    )
}

/// Plain inner join on two independently specified match-key lists.
/// Right-hand columns whose names collide are suffixed with the right
/// dataset's domain name.
pub fn merge_matched_datasets(
    left: &DataFrame,
    right: &DataFrame,
    left_keys: &[String],
    right_keys: &[String],
    right_domain: &str,
) -> Result<DataFrame> {
    join_frames(
        left,
        right,
        left_keys,
        right_keys,
        &format!(".{right_domain}"),
        JoinKind::Inner,
    )
}

/// Keeps only the rows of `dataset` whose match-key tuple appears among
/// `other`'s match-key tuples. Reapplying with identical keys on its own
/// output is a no-op.
pub fn filter_by_match_keys(
    dataset: &DataFrame,
    dataset_keys: &[String],
    other: &DataFrame,
    other_keys: &[String],
) -> Result<DataFrame> {
    let mut other_key_set: HashSet<String> = HashSet::with_capacity(other.height());
    for idx in 0..other.height() {
        other_key_set.insert(composite_key(other, other_keys, idx)?);
    }

    let mut keep = Vec::with_capacity(dataset.height());
    for idx in 0..dataset.height() {
        keep.push(other_key_set.contains(&composite_key(dataset, dataset_keys, idx)?));
    }
    filter_rows(dataset, &keep)
}

/// Keeps only the parent rows whose DOMAIN value appears among the child's
/// declared RDOMAIN values. When either side lacks the relevant column (or
/// has no rows), the gate passes everything through; relationship datasets
/// missing their RDOMAIN column are therefore not filtered at all.
pub fn filter_by_reference_domain(parent: &DataFrame, child: &DataFrame) -> Result<DataFrame> {
    if parent.height() == 0 || child.height() == 0 {
        return Ok(parent.clone());
    }
    let (Ok(parent_domains), Ok(child_domains)) = (
        parent.column(DOMAIN_COLUMN),
        child.column(REFERENCE_DOMAIN_COLUMN),
    ) else {
        warn!(
            parent_column = DOMAIN_COLUMN,
            child_column = REFERENCE_DOMAIN_COLUMN,
            "domain gate skipped: column absent, passing every parent row through"
        );
        return Ok(parent.clone());
    };

    let mut declared: HashSet<String> = HashSet::with_capacity(child.height());
    for idx in 0..child.height() {
        declared.insert(any_to_string(child_domains.get(idx).unwrap_or(AnyValue::Null)));
    }

    let mut keep = Vec::with_capacity(parent.height());
    for idx in 0..parent.height() {
        let domain = any_to_string(parent_domains.get(idx).unwrap_or(AnyValue::Null));
        keep.push(declared.contains(&domain));
    }
    filter_rows(parent, &keep)
}

/// Progressively filters `parent` by the (name, value) constraints of the
/// child dataset: child rows are grouped by the name column, and for every
/// group the parent keeps only rows whose value in that named column is in
/// the group's value set. The filters narrow one result, so a surviving
/// row satisfies every group's constraint. Surviving rows are re-sorted by
/// the referencing columns, since grouping does not preserve order.
pub fn filter_by_reference_columns(
    parent: &DataFrame,
    child: &DataFrame,
    name_column: &str,
    value_column: &str,
) -> Result<DataFrame> {
    let names = column_string_values(child, name_column)?;
    let value_col = child
        .column(value_column)
        .map_err(|_| EngineError::missing_column(value_column))?;

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, name) in names.iter().enumerate() {
        if name.trim().is_empty() {
            continue;
        }
        groups.entry(name.clone()).or_default().push(idx);
    }

    let mut result = parent.clone();
    for (named_column, child_rows) in &groups {
        if result.column(named_column).is_err() {
            return Err(EngineError::missing_column(named_column));
        }
        let reconcile = is_numeric_column(&result, named_column)?
            && subset_is_numeric(value_col, child_rows)?;

        let mut allowed: HashSet<String> = HashSet::with_capacity(child_rows.len());
        for &idx in child_rows {
            allowed.insert(group_key(
                value_col.get(idx).unwrap_or(AnyValue::Null),
                reconcile,
            ));
        }

        let keep: Vec<bool> = {
            let column = result
                .column(named_column)
                .map_err(|_| EngineError::missing_column(named_column))?;
            (0..result.height())
                .map(|idx| {
                    allowed.contains(&group_key(column.get(idx).unwrap_or(AnyValue::Null), reconcile))
                })
                .collect()
        };
        result = filter_rows(&result, &keep)?;
    }

    let sort_columns: Vec<String> = groups.keys().cloned().collect();
    if sort_columns.is_empty() {
        return Ok(result);
    }
    sort_rows_by_columns(&result, &sort_columns)
}

/// Outer-joins the filtered parent rows to the full child dataset on the
/// (resolved parent column, child value column) pair, suffixing
/// overlapping child column names with the child's domain name.
pub fn merge_on_relationship_columns(
    parent: &DataFrame,
    child: &DataFrame,
    child_domain: &str,
    name_column: &str,
    value_column: &str,
) -> Result<DataFrame> {
    if child.column(name_column).is_err() {
        return Err(EngineError::missing_column(name_column));
    }
    if child.height() == 0 {
        warn!("relationship merge skipped: child dataset has no rows");
        return Ok(parent.clone());
    }

    // the child's name column holds the parent column name, identical on
    // every row of one child frame
    let resolved_parent_column = column_value_string(child, name_column, 0);
    if resolved_parent_column.is_empty() {
        return Err(EngineError::missing_configuration(format!(
            "relationship column {name_column} does not name a parent column"
        )));
    }

    let mut left = parent.clone();
    let mut right = child.clone();
    reconcile_numeric_columns(&mut right, value_column, &mut left, &resolved_parent_column)?;

    join_frames(
        &left,
        &right,
        &[resolved_parent_column],
        &[value_column.to_string()],
        &format!(".{child_domain}"),
        JoinKind::Full,
    )
}

/// Casts both columns to Float64, but only when BOTH qualify as numeric;
/// an asymmetric pair stays untouched and will not match, so textual codes
/// that merely resemble numbers are never corrupted.
pub fn reconcile_numeric_columns(
    left: &mut DataFrame,
    left_column: &str,
    right: &mut DataFrame,
    right_column: &str,
) -> Result<()> {
    if !(is_numeric_column(left, left_column)? && is_numeric_column(right, right_column)?) {
        return Ok(());
    }
    cast_to_float(left, left_column)?;
    cast_to_float(right, right_column)
}

/// A column is numeric when its storage type already is, or when every
/// value with decimal points stripped is all digits.
pub fn is_numeric_column(df: &DataFrame, name: &str) -> Result<bool> {
    let column = df
        .column(name)
        .map_err(|_| EngineError::missing_column(name))?;
    if dtype_is_numeric(column.dtype()) {
        return Ok(true);
    }
    for idx in 0..df.height() {
        match column.get(idx).unwrap_or(AnyValue::Null) {
            AnyValue::Null => continue,
            AnyValue::String(value) => {
                if !digits_after_stripping_dots(value) {
                    return Ok(false);
                }
            }
            AnyValue::StringOwned(value) => {
                if !digits_after_stripping_dots(&value) {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
    }
    Ok(true)
}

pub fn is_numeric_value(value: &str) -> bool {
    digits_after_stripping_dots(value)
}

/// Signals [`EngineError::AmbiguousMatch`] unless exactly one row matched
/// a key that is expected to be unique.
pub fn require_unique_row(df: &DataFrame) -> Result<()> {
    if df.height() != 1 {
        return Err(EngineError::ambiguous_match(format!(
            "expected exactly one matching row, found {}",
            df.height()
        )));
    }
    Ok(())
}

fn digits_after_stripping_dots(value: &str) -> bool {
    let stripped: String = value.chars().filter(|ch| *ch != '.').collect();
    !stripped.is_empty() && stripped.chars().all(|ch| ch.is_ascii_digit())
}

fn subset_is_numeric(column: &Column, rows: &[usize]) -> Result<bool> {
    if dtype_is_numeric(column.dtype()) {
        return Ok(true);
    }
    for &idx in rows {
        match column.get(idx).unwrap_or(AnyValue::Null) {
            AnyValue::Null => continue,
            AnyValue::String(value) => {
                if !digits_after_stripping_dots(value) {
                    return Ok(false);
                }
            }
            AnyValue::StringOwned(value) => {
                if !digits_after_stripping_dots(&value) {
                    return Ok(false);
                }
            }
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn cast_to_float(df: &mut DataFrame, name: &str) -> Result<()> {
    let cast = df
        .column(name)
        .map_err(|_| EngineError::missing_column(name))?
        .cast(&DataType::Float64)?;
    df.with_column(cast.as_materialized_series().clone())?;
    Ok(())
}

/// A join key that keeps storage types apart: numeric values render as
/// `n:`-prefixed normalized numbers, text as `s:`-prefixed strings.
fn typed_value_key(value: AnyValue) -> String {
    match value {
        AnyValue::Null => "~".to_string(),
        AnyValue::String(value) => format!("s:{value}"),
        AnyValue::StringOwned(value) => format!("s:{value}"),
        AnyValue::Boolean(value) => format!("b:{value}"),
        other => match any_to_f64(other.clone()) {
            Some(number) => format!("n:{}", format_numeric(number)),
            None => format!("s:{}", any_to_string(other)),
        },
    }
}

/// Key for one referencing-variable group. Under reconciliation both sides
/// normalize to numbers, so "1" and 1.0 coincide; otherwise the typed key
/// keeps them apart.
fn group_key(value: AnyValue, reconcile: bool) -> String {
    if reconcile {
        match any_to_f64(value) {
            Some(number) => format!("n:{}", format_numeric(number)),
            None => "~".to_string(),
        }
    } else {
        typed_value_key(value)
    }
}

fn composite_key(df: &DataFrame, columns: &[String], idx: usize) -> Result<String> {
    let mut parts = Vec::with_capacity(columns.len());
    for name in columns {
        let column = df
            .column(name)
            .map_err(|_| EngineError::missing_column(name))?;
        parts.push(typed_value_key(column.get(idx).unwrap_or(AnyValue::Null)));
    }
    Ok(parts.join("\u{1f}"))
}

/// Hash join preserving column dtypes; unmatched rows pad with nulls in a
/// full join. Both key columns stay in the output, the right one under its
/// suffixed name when it collides.
fn join_frames(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[String],
    right_on: &[String],
    suffix: &str,
    kind: JoinKind,
) -> Result<DataFrame> {
    let mut right_index: HashMap<String, Vec<usize>> = HashMap::with_capacity(right.height());
    for idx in 0..right.height() {
        right_index
            .entry(composite_key(right, right_on, idx)?)
            .or_default()
            .push(idx);
    }

    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    let mut right_matched = vec![false; right.height()];
    for left_idx in 0..left.height() {
        let key = composite_key(left, left_on, left_idx)?;
        match right_index.get(&key) {
            Some(rows) => {
                for &right_idx in rows {
                    right_matched[right_idx] = true;
                    pairs.push((Some(left_idx), Some(right_idx)));
                }
            }
            None => {
                if kind == JoinKind::Full {
                    pairs.push((Some(left_idx), None));
                }
            }
        }
    }
    if kind == JoinKind::Full {
        for (right_idx, matched) in right_matched.iter().enumerate() {
            if !matched {
                pairs.push((None, Some(right_idx)));
            }
        }
    }

    let left_names: HashSet<String> = column_names(left).into_iter().collect();
    let mut columns: Vec<Column> = Vec::with_capacity(left.width() + right.width());
    for column in left.get_columns() {
        let values: Vec<AnyValue> = pairs
            .iter()
            .map(|(left_idx, _)| match left_idx {
                Some(idx) => column.get(*idx).unwrap_or(AnyValue::Null),
                None => AnyValue::Null,
            })
            .collect();
        let series =
            Series::from_any_values_and_dtype(column.name().clone(), &values, column.dtype(), false)?;
        columns.push(series.into());
    }
    for column in right.get_columns() {
        let base = column.name().to_string();
        let name = if left_names.contains(&base) {
            format!("{base}{suffix}")
        } else {
            base
        };
        let values: Vec<AnyValue> = pairs
            .iter()
            .map(|(_, right_idx)| match right_idx {
                Some(idx) => column.get(*idx).unwrap_or(AnyValue::Null),
                None => AnyValue::Null,
            })
            .collect();
        let series =
            Series::from_any_values_and_dtype(name.as_str().into(), &values, column.dtype(), false)?;
        columns.push(series.into());
    }
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cre_model::RelationshipColumns;
    use polars::prelude::NamedFrom;

    fn parent_frame() -> DataFrame {
        let columns: Vec<Column> = vec![
            Series::new(
                "USUBJID".into(),
                vec!["S1".to_string(), "S1".to_string(), "S2".to_string()],
            )
            .into(),
            Series::new("AESEQ".into(), vec![1.0f64, 2.0, 1.0]).into(),
            Series::new(
                "DOMAIN".into(),
                vec!["AE".to_string(), "AE".to_string(), "AE".to_string()],
            )
            .into(),
        ];
        DataFrame::new(columns).expect("parent frame")
    }

    fn supp_frame() -> DataFrame {
        let columns: Vec<Column> = vec![
            Series::new("USUBJID".into(), vec!["S1".to_string(), "S1".to_string()]).into(),
            Series::new("RDOMAIN".into(), vec!["AE".to_string(), "AE".to_string()]).into(),
            Series::new("IDVAR".into(), vec!["AESEQ".to_string(), "AESEQ".to_string()]).into(),
            Series::new("IDVARVAL".into(), vec!["1".to_string(), "2".to_string()]).into(),
            Series::new(
                "QVAL".into(),
                vec!["MILD".to_string(), "SEVERE".to_string()],
            )
            .into(),
        ];
        DataFrame::new(columns).expect("supp frame")
    }

    #[test]
    fn numeric_parent_matches_textual_child_values() {
        let descriptor = RelationshipDescriptor::new(
            "SUPPAE",
            RelationshipColumns::new("IDVAR", "IDVARVAL"),
        );
        let keys = vec!["USUBJID".to_string()];
        let merged = merge_relationship_datasets(
            &parent_frame(),
            &keys,
            &supp_frame(),
            &keys,
            &descriptor,
        )
        .expect("merged");

        // both S1 rows match their qualifiers; S2 fails the key filter
        assert_eq!(merged.height(), 2);
        assert_eq!(column_value_string(&merged, "QVAL", 0), "MILD");
        assert_eq!(column_value_string(&merged, "QVAL", 1), "SEVERE");
        // overlapping child column gets the domain suffix
        assert!(merged.column("USUBJID.SUPPAE").is_ok());
    }

    #[test]
    fn asymmetric_value_pair_does_not_match() {
        let parent = parent_frame();
        let columns: Vec<Column> = vec![
            Series::new("USUBJID".into(), vec!["S1".to_string()]).into(),
            Series::new("RDOMAIN".into(), vec!["AE".to_string()]).into(),
            Series::new("IDVAR".into(), vec!["AESEQ".to_string()]).into(),
            Series::new("IDVARVAL".into(), vec!["1x".to_string()]).into(),
        ];
        let child = DataFrame::new(columns).expect("child");

        let filtered = filter_by_reference_columns(&parent, &child, "IDVAR", "IDVARVAL")
            .expect("filtered");
        assert_eq!(filtered.height(), 0);
    }

    #[test]
    fn reference_column_filter_is_conjunctive() {
        let columns: Vec<Column> = vec![
            Series::new("AESEQ".into(), vec![1.0f64, 2.0, 3.0]).into(),
            Series::new(
                "AEGRPID".into(),
                vec!["G1".to_string(), "G1".to_string(), "G2".to_string()],
            )
            .into(),
        ];
        let parent = DataFrame::new(columns).expect("parent");

        let columns: Vec<Column> = vec![
            Series::new(
                "IDVAR".into(),
                vec!["AESEQ".to_string(), "AESEQ".to_string(), "AEGRPID".to_string()],
            )
            .into(),
            Series::new(
                "IDVARVAL".into(),
                vec!["1".to_string(), "3".to_string(), "G1".to_string()],
            )
            .into(),
        ];
        let child = DataFrame::new(columns).expect("child");

        let filtered = filter_by_reference_columns(&parent, &child, "IDVAR", "IDVARVAL")
            .expect("filtered");
        // AESEQ must be 1 or 3 AND AEGRPID must be G1; only the first row is
        assert_eq!(filtered.height(), 1);
        assert_eq!(column_value_string(&filtered, "AESEQ", 0), "1");
    }

    #[test]
    fn survivors_are_sorted_by_referencing_columns() {
        let columns: Vec<Column> = vec![
            Series::new("AESEQ".into(), vec![3.0f64, 1.0, 2.0]).into(),
        ];
        let parent = DataFrame::new(columns).expect("parent");

        let columns: Vec<Column> = vec![
            Series::new(
                "IDVAR".into(),
                vec!["AESEQ".to_string(), "AESEQ".to_string(), "AESEQ".to_string()],
            )
            .into(),
            Series::new(
                "IDVARVAL".into(),
                vec!["3".to_string(), "1".to_string(), "2".to_string()],
            )
            .into(),
        ];
        let child = DataFrame::new(columns).expect("child");

        let filtered = filter_by_reference_columns(&parent, &child, "IDVAR", "IDVARVAL")
            .expect("filtered");
        let order: Vec<String> = (0..filtered.height())
            .map(|idx| column_value_string(&filtered, "AESEQ", idx))
            .collect();
        assert_eq!(order, vec!["1", "2", "3"]);
    }

    #[test]
    fn domain_gate_passes_through_without_columns() {
        let columns: Vec<Column> =
            vec![Series::new("USUBJID".into(), vec!["S1".to_string()]).into()];
        let parent = DataFrame::new(columns).expect("parent");
        let columns: Vec<Column> =
            vec![Series::new("USUBJID".into(), vec!["S9".to_string()]).into()];
        let child = DataFrame::new(columns).expect("child");

        let gated = filter_by_reference_domain(&parent, &child).expect("gated");
        assert_eq!(gated.height(), parent.height());
    }

    #[test]
    fn domain_gate_filters_on_declared_domains() {
        let parent = parent_frame();
        let columns: Vec<Column> =
            vec![Series::new("RDOMAIN".into(), vec!["CM".to_string()]).into()];
        let child = DataFrame::new(columns).expect("child");

        let gated = filter_by_reference_domain(&parent, &child).expect("gated");
        assert_eq!(gated.height(), 0);
    }

    #[test]
    fn match_key_filter_is_idempotent() {
        let parent = parent_frame();
        let child = supp_frame();
        let keys = vec!["USUBJID".to_string()];

        let once = filter_by_match_keys(&parent, &keys, &child, &keys).expect("once");
        let twice = filter_by_match_keys(&once, &keys, &child, &keys).expect("twice");
        assert_eq!(once.height(), twice.height());
        for name in column_names(&once) {
            for idx in 0..once.height() {
                assert_eq!(
                    column_value_string(&once, &name, idx),
                    column_value_string(&twice, &name, idx)
                );
            }
        }
    }

    #[test]
    fn numeric_column_rule() {
        let columns: Vec<Column> = vec![
            Series::new("A".into(), vec!["1.5".to_string(), "2".to_string()]).into(),
            Series::new("B".into(), vec!["1.5x".to_string(), "2".to_string()]).into(),
            Series::new("C".into(), vec![1.0f64, 2.0]).into(),
        ];
        let df = DataFrame::new(columns).expect("frame");

        assert!(is_numeric_column(&df, "A").expect("A"));
        assert!(!is_numeric_column(&df, "B").expect("B"));
        assert!(is_numeric_column(&df, "C").expect("C"));

        assert!(is_numeric_value("1.5"));
        assert!(!is_numeric_value("1.5x"));
    }

    #[test]
    fn reconciliation_needs_both_sides() {
        let left_columns: Vec<Column> = vec![Series::new("K".into(), vec![1.0f64, 2.0]).into()];
        let mut left = DataFrame::new(left_columns).expect("left");
        let right_columns: Vec<Column> =
            vec![Series::new("V".into(), vec!["1x".to_string(), "2".to_string()]).into()];
        let mut right = DataFrame::new(right_columns).expect("right");

        reconcile_numeric_columns(&mut left, "K", &mut right, "V").expect("reconcile");
        assert!(!dtype_is_numeric(right.column("V").expect("V").dtype()));

        let right_columns: Vec<Column> =
            vec![Series::new("V".into(), vec!["1".to_string(), "2".to_string()]).into()];
        let mut right = DataFrame::new(right_columns).expect("right");
        reconcile_numeric_columns(&mut left, "K", &mut right, "V").expect("reconcile");
        assert!(dtype_is_numeric(right.column("V").expect("V").dtype()));
    }

    #[test]
    fn matched_merge_is_inner() {
        let left = parent_frame();
        let columns: Vec<Column> = vec![
            Series::new("USUBJID".into(), vec!["S2".to_string()]).into(),
            Series::new("VISIT".into(), vec!["WEEK 1".to_string()]).into(),
        ];
        let right = DataFrame::new(columns).expect("right");
        let keys = vec!["USUBJID".to_string()];

        let merged = merge_matched_datasets(&left, &right, &keys, &keys, "SV").expect("merged");
        assert_eq!(merged.height(), 1);
        assert_eq!(column_value_string(&merged, "VISIT", 0), "WEEK 1");
        assert!(merged.column("USUBJID.SV").is_ok());
    }

    #[test]
    fn unique_row_check() {
        let df = parent_frame();
        let err = require_unique_row(&df).unwrap_err();
        assert!(matches!(err, EngineError::AmbiguousMatch { .. }));

        let one = filter_rows(&df, &[true, false, false]).expect("one row");
        assert!(require_unique_row(&one).is_ok());
    }
}

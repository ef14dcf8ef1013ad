//! Normalisation of the sources' native date encodings to the polars `Date` type.

use itertools::Itertools;
use log::warn;
use polars::lazy::dsl::coalesce;
use polars::prelude::*;

use crate::error::CovidAtlasResult;

/// Formats tried, in order, when a source does not commit to one encoding.
const INFERRED_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d", "%d-%b-%Y"];

fn strptime(column: &str, format: &str, exact: bool) -> Expr {
    col(column)
        .cast(DataType::String)
        .str()
        .to_date(StrptimeOptions {
            format: Some(format.into()),
            strict: false,
            exact,
            cache: true,
        })
}

/// `YYYYMMDD`, either as integer or text.
pub fn parse_compact_date(column: &str) -> Expr {
    strptime(column, "%Y%m%d", true).alias(column)
}

/// `M/D/YYYY`.
pub fn parse_us_date(column: &str) -> Expr {
    strptime(column, "%m/%d/%Y", true).alias(column)
}

/// First of [`INFERRED_FORMATS`] that parses, per row. ISO dates may carry a time suffix.
pub fn infer_date(column: &str) -> Expr {
    let parsers = INFERRED_FORMATS
        .iter()
        .map(|format| strptime(column, format, !format.starts_with("%Y-")))
        .collect_vec();
    coalesce(&parsers).alias(column)
}

/// Apply `parser` to `column` of `df` and drop the rows it could not parse; null dates never
/// match in a join.
pub fn parse_dates(
    df: &DataFrame,
    table: &str,
    column: &str,
    parser: fn(&str) -> Expr,
) -> CovidAtlasResult<DataFrame> {
    let parsed = df.clone().lazy().with_column(parser(column)).collect()?;
    let undated = parsed.column(column)?.null_count();
    if undated > 0 {
        warn!("Dropping {undated} row(s) of `{table}` with an unparseable `{column}`");
    }
    Ok(parsed
        .lazy()
        .filter(col(column).is_not_null())
        .collect()?)
}

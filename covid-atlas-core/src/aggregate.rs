use itertools::Itertools;
use log::debug;
use polars::prelude::*;

use crate::error::CovidAtlasResult;

/// Replace nulls in `metrics` with zero. Other columns are left as they are.
pub fn zero_fill(lf: LazyFrame, metrics: &[&str]) -> LazyFrame {
    lf.with_columns(
        metrics
            .iter()
            .map(|metric| col(metric).cast(DataType::Float64).fill_null(lit(0.0)))
            .collect_vec(),
    )
}

/// Unweighted mean of each of `metrics` per distinct `group_keys` tuple, with missing values
/// counted as zero. Output is sorted by the group keys.
pub fn aggregate_by_group(
    table: &DataFrame,
    group_keys: &[&str],
    metrics: &[&str],
) -> CovidAtlasResult<DataFrame> {
    let out = zero_fill(table.clone().lazy(), metrics)
        .group_by(group_keys.iter().map(|key| col(key)).collect_vec())
        .agg(metrics.iter().map(|metric| col(metric).mean()).collect_vec())
        .sort(group_keys.to_vec(), SortMultipleOptions::default())
        .collect()?;
    debug!("Aggregated by {group_keys:?}: {:?}", out.shape());
    Ok(out)
}

/// Retain the rows where at least one of `metrics` is non-zero.
pub fn drop_all_zero_rows(table: &DataFrame, metrics: &[&str]) -> CovidAtlasResult<DataFrame> {
    let any_non_zero = metrics
        .iter()
        .map(|metric| col(metric).fill_null(lit(0.0)).neq(lit(0.0)))
        .reduce(|acc, next| acc.or(next))
        .unwrap_or(lit(false));
    Ok(table.clone().lazy().filter(any_non_zero).collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::COL;

    fn per_capita() -> DataFrame {
        df!(
            COL::US_STATE => &["CA", "CA", "TX"],
            COL::US_SUBMISSION_DATE => &["2021-01-01", "2021-01-02", "2021-01-01"],
            COL::US_NEW_CASE => &[Some(0.1), None, Some(0.4)],
            COL::US_DAILY_VACCINATIONS => &[None, None, Some(0.2)]
        )
        .unwrap()
    }

    #[test]
    fn missing_values_should_count_as_zero() {
        let out = aggregate_by_group(
            &per_capita(),
            &[COL::US_STATE],
            &[COL::US_NEW_CASE, COL::US_DAILY_VACCINATIONS],
        )
        .unwrap();
        assert_eq!(
            out.get_column_names(),
            &[COL::US_STATE, COL::US_NEW_CASE, COL::US_DAILY_VACCINATIONS]
        );
        let states = out.column(COL::US_STATE).unwrap().str().unwrap();
        assert_eq!(states.into_iter().collect_vec(), vec![Some("CA"), Some("TX")]);
        let cases = out.column(COL::US_NEW_CASE).unwrap().f64().unwrap();
        assert_eq!(cases.into_iter().collect_vec(), vec![Some(0.05), Some(0.4)]);
        let vax = out.column(COL::US_DAILY_VACCINATIONS).unwrap().f64().unwrap();
        assert_eq!(vax.into_iter().collect_vec(), vec![Some(0.0), Some(0.2)]);
    }

    #[test]
    fn aggregating_a_filled_table_twice_is_stable() {
        let metrics = [COL::US_NEW_CASE, COL::US_DAILY_VACCINATIONS];
        let filled = zero_fill(per_capita().lazy(), &metrics).collect().unwrap();
        let once = aggregate_by_group(&filled, &[COL::US_SUBMISSION_DATE], &metrics).unwrap();
        let twice = aggregate_by_group(&filled, &[COL::US_SUBMISSION_DATE], &metrics).unwrap();
        assert!(once.equals(&twice));
        let refill = zero_fill(filled.clone().lazy(), &metrics).collect().unwrap();
        assert!(refill.equals(&filled));
    }

    #[test]
    fn drop_all_zero_rows_should_keep_any_non_zero() {
        let df = df!(
            "a" => &[Some(0.0), None, Some(1.0), Some(0.0)],
            "b" => &[Some(0.0), Some(0.0), None, Some(-2.0)]
        )
        .unwrap();
        let out = drop_all_zero_rows(&df, &["a", "b"]).unwrap();
        assert_eq!(out.height(), 2);
        let a = out.column("a").unwrap().f64().unwrap();
        assert_eq!(a.into_iter().collect_vec(), vec![Some(1.0), Some(0.0)]);
    }
}

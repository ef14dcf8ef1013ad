//! Consolidation of same-grain raw tables into one row per (jurisdiction, date).

use itertools::Itertools;
use log::info;
use polars::prelude::*;

use crate::{
    dates::{infer_date, parse_compact_date, parse_dates, parse_us_date},
    error::CovidAtlasResult,
    identifiers::{in_domain, restrict_to_domain, IdentifierMapping},
    schema::{
        TableSchema, AGE_BRACKETS, ALL_AGES, ALL_SEXES, ETHNICITY_METRICS, US_AGE_DEATHS_SCHEMA,
        US_CASES_SCHEMA, US_ETHNICITY_DEATHS_SCHEMA, US_VACCINATIONS_SCHEMA,
        WORLD_CASES_SCHEMA, WORLD_VACCINATIONS_SCHEMA,
    },
    COL,
};

/// Join keys of every consolidated US table.
pub const US_KEYS: &[&str] = &[COL::US_STATE, COL::US_SUBMISSION_DATE];
/// Chronological order of the consolidated US tables.
pub const US_ORDER: &[&str] = &[COL::US_SUBMISSION_DATE, COL::US_STATE];
/// Join keys of the world cases and vaccinations tables.
pub const WORLD_KEYS: &[&str] = &[COL::WORLD_LOCATION, COL::WORLD_DATE, COL::WORLD_ISO_CODE];

fn exprs(columns: &[&str]) -> Vec<Expr> {
    columns.iter().map(|c| col(c)).collect()
}

/// Project `df` onto `schema`, with `text` columns as strings and `metrics` as `Float64`. Sparse
/// CSV columns are often inferred as strings or integers.
fn prepare(
    df: &DataFrame,
    schema: &TableSchema,
    text: &[&str],
    metrics: &[&str],
) -> CovidAtlasResult<DataFrame> {
    let casts = text
        .iter()
        .map(|c| col(c).cast(DataType::String))
        .chain(metrics.iter().map(|c| col(c).cast(DataType::Float64)))
        .collect_vec();
    Ok(schema.select(df)?.lazy().with_columns(casts).collect()?)
}

/// Every row of `left`, with the columns of `right` attached where all `keys` match.
pub fn left_join(left: &DataFrame, right: &DataFrame, keys: &[&str]) -> CovidAtlasResult<DataFrame> {
    Ok(left
        .clone()
        .lazy()
        .join(
            right.clone().lazy(),
            exprs(keys),
            exprs(keys),
            JoinArgs::new(JoinType::Left),
        )
        .collect()?)
}

/// Full outer join on `keys`: one row per distinct key tuple of either side, with the other
/// columns of each side attached where present, sorted by `order_by`.
pub fn outer_ordered_merge(
    left: &DataFrame,
    right: &DataFrame,
    keys: &[&str],
    order_by: &[&str],
) -> CovidAtlasResult<DataFrame> {
    let union = concat(
        [
            left.clone().lazy().select(exprs(keys)),
            right.clone().lazy().select(exprs(keys)),
        ],
        UnionArgs::default(),
    )?
    .unique_stable(None, UniqueKeepStrategy::First);
    Ok(union
        .join(
            left.clone().lazy(),
            exprs(keys),
            exprs(keys),
            JoinArgs::new(JoinType::Left),
        )
        .join(
            right.clone().lazy(),
            exprs(keys),
            exprs(keys),
            JoinArgs::new(JoinType::Left),
        )
        .sort(order_by.to_vec(), SortMultipleOptions::default())
        .collect()?)
}

/// World new cases with daily vaccinations attached. The cases table fixes the row set.
pub fn world_cases_vaccinations(
    cases: &DataFrame,
    vaccinations: &DataFrame,
) -> CovidAtlasResult<DataFrame> {
    let text = [COL::WORLD_LOCATION, COL::WORLD_ISO_CODE];
    let cases = prepare(cases, &WORLD_CASES_SCHEMA, &text, &[COL::WORLD_NEW_CASES])?;
    let cases = parse_dates(&cases, WORLD_CASES_SCHEMA.name, COL::WORLD_DATE, infer_date)?;
    let vaccinations = prepare(
        vaccinations,
        &WORLD_VACCINATIONS_SCHEMA,
        &text,
        &[COL::WORLD_DAILY_VACCINATIONS],
    )?;
    let vaccinations = parse_dates(
        &vaccinations,
        WORLD_VACCINATIONS_SCHEMA.name,
        COL::WORLD_DATE,
        infer_date,
    )?;
    let out = left_join(&cases, &vaccinations, WORLD_KEYS)?;
    info!("World cases and vaccinations: {:?}", out.shape());
    Ok(out)
}

/// US new cases and daily vaccinations keyed by postal code, restricted to the state domain.
/// Neither source is complete, so both row sets are kept.
pub fn us_cases_vaccinations(
    cases: &DataFrame,
    vaccinations: &DataFrame,
    states: &IdentifierMapping,
) -> CovidAtlasResult<DataFrame> {
    let cases = prepare(
        cases,
        &US_CASES_SCHEMA,
        &[COL::US_STATE],
        &[COL::US_NEW_CASE],
    )?;
    let cases = parse_dates(&cases, US_CASES_SCHEMA.name, COL::US_SUBMISSION_DATE, infer_date)?;

    let vaccinations = prepare(
        vaccinations,
        &US_VACCINATIONS_SCHEMA,
        &[COL::US_VAX_LOCATION],
        &[COL::US_DAILY_VACCINATIONS],
    )?;
    let vaccinations = states
        .translate_column(&vaccinations, COL::US_VAX_LOCATION)?
        .lazy()
        .select([
            col(COL::US_VAX_LOCATION).alias(COL::US_STATE),
            col(COL::US_VAX_DATE).alias(COL::US_SUBMISSION_DATE),
            col(COL::US_DAILY_VACCINATIONS),
        ])
        .collect()?;
    let vaccinations = parse_dates(
        &vaccinations,
        US_VACCINATIONS_SCHEMA.name,
        COL::US_SUBMISSION_DATE,
        infer_date,
    )?;

    let merged = outer_ordered_merge(&cases, &vaccinations, US_KEYS, US_ORDER)?;
    let out = restrict_to_domain(&merged, COL::US_STATE, &states.domain())?;
    info!("US cases and vaccinations: {:?}", out.shape());
    Ok(out)
}

/// Long-form age deaths to one column per age bracket, keyed by (date, postal code).
///
/// Only the "All Sexes" slice is used and the "All Ages" total is left out so that bracket
/// columns do not double count. Rows naming an unknown state are dropped; repeated
/// (date, state, bracket) rows are averaged.
pub fn pivot_age_deaths(
    age_deaths: &DataFrame,
    states: &IdentifierMapping,
) -> CovidAtlasResult<DataFrame> {
    let age = prepare(
        age_deaths,
        &US_AGE_DEATHS_SCHEMA,
        &[COL::AGE_STATE, COL::AGE_SEX, COL::AGE_GROUP],
        &[COL::AGE_COVID_DEATHS],
    )?;
    let age = parse_dates(&age, US_AGE_DEATHS_SCHEMA.name, COL::AGE_END_DATE, parse_us_date)?;
    let age = age
        .lazy()
        .filter(
            col(COL::AGE_SEX)
                .eq(lit(ALL_SEXES))
                .and(col(COL::AGE_GROUP).neq(lit(ALL_AGES)))
                .and(in_domain(COL::AGE_STATE, &states.sources())),
        )
        .collect()?;
    let age = states.translate_column(&age, COL::AGE_STATE)?;

    let brackets = AGE_BRACKETS
        .iter()
        .map(|bracket| {
            col(COL::AGE_COVID_DEATHS)
                .filter(col(COL::AGE_GROUP).eq(lit(*bracket)))
                .mean()
                .alias(bracket)
        })
        .collect_vec();
    Ok(age
        .lazy()
        .select([
            col(COL::AGE_END_DATE).alias(COL::US_SUBMISSION_DATE),
            col(COL::AGE_STATE).alias(COL::US_STATE),
            col(COL::AGE_GROUP),
            col(COL::AGE_COVID_DEATHS),
        ])
        .group_by([col(COL::US_STATE), col(COL::US_SUBMISSION_DATE)])
        .agg(brackets)
        .sort(US_ORDER.to_vec(), SortMultipleOptions::default())
        .collect()?)
}

/// Deaths by ethnicity and by age bracket, keyed by (postal code, date), in date order.
pub fn us_ethnicity_age_deaths(
    ethnicity_deaths: &DataFrame,
    age_deaths: &DataFrame,
    states: &IdentifierMapping,
) -> CovidAtlasResult<DataFrame> {
    let ethnicity = prepare(
        ethnicity_deaths,
        &US_ETHNICITY_DEATHS_SCHEMA,
        &[COL::ETHNICITY_STATE],
        ETHNICITY_METRICS,
    )?;
    let ethnicity = parse_dates(
        &ethnicity,
        US_ETHNICITY_DEATHS_SCHEMA.name,
        COL::ETHNICITY_DATE,
        parse_compact_date,
    )?;
    let ethnicity = states.translate_column(&ethnicity, COL::ETHNICITY_STATE)?;
    let ethnicity = restrict_to_domain(&ethnicity, COL::ETHNICITY_STATE, &states.domain())?
        .lazy()
        .select(
            [
                col(COL::ETHNICITY_STATE).alias(COL::US_STATE),
                col(COL::ETHNICITY_DATE).alias(COL::US_SUBMISSION_DATE),
            ]
            .into_iter()
            .chain(ETHNICITY_METRICS.iter().map(|c| col(c)))
            .collect_vec(),
        )
        .collect()?;

    let age = pivot_age_deaths(age_deaths, states)?;
    let out = outer_ordered_merge(&ethnicity, &age, US_KEYS, US_ORDER)?;
    info!("US deaths by ethnicity and age: {:?}", out.shape());
    Ok(out)
}

/// The consolidated US table: cases, vaccinations, and deaths per (postal code, date).
pub fn us_combined(
    cases_vaccinations: &DataFrame,
    deaths: &DataFrame,
) -> CovidAtlasResult<DataFrame> {
    let out = outer_ordered_merge(cases_vaccinations, deaths, US_KEYS, US_ORDER)?;
    info!("US consolidated: {:?}", out.shape());
    Ok(out)
}

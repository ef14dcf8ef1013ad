//! Population denominators per jurisdiction and conversion of raw counts to per-capita rates.

use itertools::Itertools;
use log::{debug, info};
use polars::prelude::*;

use crate::{
    config::PopulationConfig,
    error::CovidAtlasResult,
    identifiers::{in_domain, restrict_to_domain, IdentifierMapping},
    schema::{
        us_population_estimate_column, validate_us_population, WORLD_CASES_SCHEMA,
        WORLD_POPULATION_SCHEMA,
    },
    COL,
};

/// World population in persons, keyed by ISO3 code: `(iso_code, population)`.
///
/// Country names of the UN table are resolved first through the location names of the world
/// cases table, then through the world identifier table.
pub fn world_population(
    raw: &DataFrame,
    world_cases: &DataFrame,
    world_ids: &IdentifierMapping,
    config: &PopulationConfig,
) -> CovidAtlasResult<DataFrame> {
    let raw = WORLD_POPULATION_SCHEMA.select(raw)?;
    WORLD_CASES_SCHEMA.validate(world_cases)?;
    let by_location =
        IdentifierMapping::from_columns(world_cases, &[COL::WORLD_LOCATION], COL::WORLD_ISO_CODE)?;

    let population = raw
        .lazy()
        .filter(
            col(COL::WORLD_POP_TIME)
                .cast(DataType::Int64)
                .eq(lit(config.reference_year as i64))
                .and(
                    col(COL::WORLD_POP_VARIANT)
                        .cast(DataType::String)
                        .eq(lit(config.world_variant.as_str())),
                ),
        )
        .select([
            col(COL::WORLD_POP_LOCATION)
                .cast(DataType::String)
                .alias(COL::WORLD_ISO_CODE),
            (col(COL::WORLD_POP_TOTAL).cast(DataType::Float64) * lit(config.world_scale))
                .alias(COL::POPULATION),
        ])
        .collect()?;
    debug!(
        "World population rows for {} ({}): {}",
        config.reference_year,
        config.world_variant,
        population.height()
    );

    let population = by_location.translate_column(&population, COL::WORLD_ISO_CODE)?;
    let population = world_ids.translate_column(&population, COL::WORLD_ISO_CODE)?;
    let out = restrict_to_domain(&population, COL::WORLD_ISO_CODE, &world_ids.domain())?;
    info!("World population: {:?}", out.shape());
    Ok(out)
}

/// US population estimates of the reference year, keyed by postal code: `(state, population)`.
/// Rows that are not a known state, such as regions or the national total, are left out.
pub fn us_population(
    raw: &DataFrame,
    states: &IdentifierMapping,
    config: &PopulationConfig,
) -> CovidAtlasResult<DataFrame> {
    validate_us_population(raw, config.reference_year)?;
    let estimate = us_population_estimate_column(config.reference_year);
    let population = raw
        .clone()
        .lazy()
        .select([
            col(COL::US_POP_NAME)
                .cast(DataType::String)
                .alias(COL::US_STATE),
            col(&estimate)
                .cast(DataType::Float64)
                .alias(COL::POPULATION),
        ])
        .filter(in_domain(COL::US_STATE, &states.sources()))
        .collect()?;
    let out = states.translate_column(&population, COL::US_STATE)?;
    info!("US population: {:?}", out.shape());
    Ok(out)
}

/// Divide each of `metrics` by the population of its jurisdiction.
///
/// Observations of a jurisdiction absent from `population`, or with a null population, are
/// dropped. Null counts stay null. The population column is not part of the output.
pub fn normalize(
    observations: &DataFrame,
    population: &DataFrame,
    jurisdiction_key: &str,
    population_key: &str,
    population_value: &str,
    metrics: &[&str],
) -> CovidAtlasResult<DataFrame> {
    let population = population
        .clone()
        .lazy()
        .select([
            col(population_key).cast(DataType::String),
            col(population_value).cast(DataType::Float64),
        ])
        .filter(col(population_key).is_not_null())
        .unique_stable(
            Some(vec![population_key.to_string()]),
            UniqueKeepStrategy::First,
        );
    let rates = metrics
        .iter()
        .map(|metric| (col(metric).cast(DataType::Float64) / col(population_value)).alias(metric))
        .collect_vec();
    let out = observations
        .clone()
        .lazy()
        .join(
            population,
            [col(jurisdiction_key)],
            [col(population_key)],
            JoinArgs::new(JoinType::Left),
        )
        // Inner join that keeps the order of `observations`
        .filter(col(population_value).is_not_null())
        .with_columns(rates)
        .select([all().exclude([population_value])])
        .collect()?;
    debug!(
        "Normalized {} metrics; {} of {} rows had no population",
        metrics.len(),
        observations.height() - out.height(),
        observations.height()
    );
    Ok(out)
}

//! Per-domain pipelines: raw tables in, the per-capita table and its two aggregates out.

use log::{debug, error, info};
use polars::prelude::*;

use crate::{
    aggregate::{aggregate_by_group, drop_all_zero_rows},
    config::Config,
    datasets::{Dataset, Datasets, Domain},
    error::CovidAtlasResult,
    geo::attach_geometry,
    identifiers::{
        load_identifier_table, restrict_to_domain, state_identifier_mapping,
        world_identifier_mapping, IdentifierMapping,
    },
    join::{us_cases_vaccinations, us_combined, us_ethnicity_age_deaths, world_cases_vaccinations},
    population::{normalize, us_population, world_population},
    schema::{
        us_metrics, MetricGroup, STATE_IDENTIFIERS_SCHEMA, US_MAP_SCHEMA, WORLD_IDENTIFIERS_SCHEMA,
        WORLD_MAP_SCHEMA, WORLD_METRICS,
    },
    COL,
};

/// The derived tables of one domain.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub domain: Domain,
    /// One row per (jurisdiction, date), metrics divided by population.
    pub per_capita: DataFrame,
    /// Mean per jurisdiction, with a WKT `geometry` column.
    pub by_jurisdiction: DataFrame,
    /// Mean per date across jurisdictions.
    pub by_date: DataFrame,
}

impl AnalysisResult {
    pub fn date_key(&self) -> &'static str {
        match self.domain {
            Domain::World => COL::WORLD_DATE,
            Domain::Us => COL::US_SUBMISSION_DATE,
        }
    }

    pub fn jurisdiction_key(&self) -> &'static str {
        match self.domain {
            Domain::World => COL::WORLD_ISO_CODE,
            Domain::Us => COL::US_STATE,
        }
    }

    /// The by-date means of one metric group, without the dates where every metric of the group
    /// is zero. Deaths by ethnicity and by age are reported for far fewer dates than cases.
    pub fn by_date_view(&self, group: MetricGroup) -> CovidAtlasResult<DataFrame> {
        let metrics = group.metrics();
        let columns = std::iter::once(self.date_key())
            .chain(metrics.iter().copied())
            .map(col)
            .collect::<Vec<_>>();
        let view = self.by_date.clone().lazy().select(columns).collect()?;
        drop_all_zero_rows(&view, metrics)
    }
}

/// Results of both domains. A failure in one never hides the other's result.
#[derive(Debug)]
pub struct AllResults {
    pub world: CovidAtlasResult<AnalysisResult>,
    pub us: CovidAtlasResult<AnalysisResult>,
}

/// The identifier mappings of both domains.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    /// Country name and ISO2 onto ISO3.
    pub world_ids: IdentifierMapping,
    /// State name onto postal code.
    pub states: IdentifierMapping,
}

impl ReferenceTables {
    pub fn load(config: &Config) -> CovidAtlasResult<Self> {
        debug!(
            "Loading identifier tables from {} and {}",
            config.world_identifiers.display(),
            config.state_identifiers.display()
        );
        let world = load_identifier_table(&config.world_identifiers, &WORLD_IDENTIFIERS_SCHEMA)?;
        let states = load_identifier_table(&config.state_identifiers, &STATE_IDENTIFIERS_SCHEMA)?;
        Ok(Self {
            world_ids: world_identifier_mapping(&world)?,
            states: state_identifier_mapping(&states)?,
        })
    }
}

pub fn world_pipeline(
    datasets: &Datasets,
    reference: &ReferenceTables,
    config: &Config,
) -> CovidAtlasResult<AnalysisResult> {
    let world_ids = &reference.world_ids;
    let cases = datasets.table(Dataset::WorldCovidData)?;

    let joined = world_cases_vaccinations(cases, datasets.table(Dataset::WorldCovidVaccinations)?)?;
    let joined = world_ids.translate_column(&joined, COL::WORLD_ISO_CODE)?;
    let joined = restrict_to_domain(&joined, COL::WORLD_ISO_CODE, &world_ids.domain())?;

    let population = world_population(
        datasets.table(Dataset::WorldPopulation)?,
        cases,
        world_ids,
        &config.population,
    )?;
    let per_capita = normalize(
        &joined,
        &population,
        COL::WORLD_ISO_CODE,
        COL::WORLD_ISO_CODE,
        COL::POPULATION,
        WORLD_METRICS,
    )?;
    info!("World per capita: {:?}", per_capita.shape());

    let by_jurisdiction = aggregate_by_group(
        &per_capita,
        &[COL::WORLD_ISO_CODE, COL::WORLD_LOCATION],
        WORLD_METRICS,
    )?;
    // The map is keyed by ISO2
    let map = WORLD_MAP_SCHEMA.select(datasets.table(Dataset::WorldCountriesMap)?)?;
    let map = world_ids.translate_column(&map, COL::WORLD_MAP_ISO)?;
    let by_jurisdiction = attach_geometry(
        &by_jurisdiction,
        &map,
        COL::WORLD_ISO_CODE,
        COL::WORLD_MAP_ISO,
    )?;
    let by_date = aggregate_by_group(&per_capita, &[COL::WORLD_DATE], WORLD_METRICS)?;

    Ok(AnalysisResult {
        domain: Domain::World,
        per_capita,
        by_jurisdiction,
        by_date,
    })
}

pub fn us_pipeline(
    datasets: &Datasets,
    reference: &ReferenceTables,
    config: &Config,
) -> CovidAtlasResult<AnalysisResult> {
    let states = &reference.states;
    let metrics = us_metrics();

    let cases_vaccinations = us_cases_vaccinations(
        datasets.table(Dataset::UsCovidData)?,
        datasets.table(Dataset::UsCovidVaccinations)?,
        states,
    )?;
    let deaths = us_ethnicity_age_deaths(
        datasets.table(Dataset::UsCovidEthnicityDeaths)?,
        datasets.table(Dataset::UsCovidAgeDeaths)?,
        states,
    )?;
    let combined = us_combined(&cases_vaccinations, &deaths)?;

    let population = us_population(
        datasets.table(Dataset::UsPopulation)?,
        states,
        &config.population,
    )?;
    let per_capita = normalize(
        &combined,
        &population,
        COL::US_STATE,
        COL::US_STATE,
        COL::POPULATION,
        &metrics,
    )?;
    info!("US per capita: {:?}", per_capita.shape());

    let by_jurisdiction = aggregate_by_group(&per_capita, &[COL::US_STATE], &metrics)?;
    let map = US_MAP_SCHEMA.select(datasets.table(Dataset::UsStatesMap)?)?;
    let map = states.translate_column(&map, COL::US_MAP_STATE)?;
    let by_jurisdiction =
        attach_geometry(&by_jurisdiction, &map, COL::US_STATE, COL::US_MAP_STATE)?;
    let by_date = aggregate_by_group(&per_capita, &[COL::US_SUBMISSION_DATE], &metrics)?;

    Ok(AnalysisResult {
        domain: Domain::Us,
        per_capita,
        by_jurisdiction,
        by_date,
    })
}

pub fn run(
    domain: Domain,
    datasets: &Datasets,
    reference: &ReferenceTables,
    config: &Config,
) -> CovidAtlasResult<AnalysisResult> {
    let result = match domain {
        Domain::World => world_pipeline(datasets, reference, config),
        Domain::Us => us_pipeline(datasets, reference, config),
    };
    if let Err(err) = &result {
        error!("The {domain} pipeline failed: {err}");
    }
    result
}

/// Run both domains. They share no state, so each runs on its own thread.
pub fn run_all(datasets: &Datasets, reference: &ReferenceTables, config: &Config) -> AllResults {
    std::thread::scope(|scope| {
        let world = scope.spawn(|| run(Domain::World, datasets, reference, config));
        let us = scope.spawn(|| run(Domain::Us, datasets, reference, config));
        AllResults {
            world: joined(Domain::World, world.join()),
            us: joined(Domain::Us, us.join()),
        }
    })
}

fn joined(
    domain: Domain,
    result: std::thread::Result<CovidAtlasResult<AnalysisResult>>,
) -> CovidAtlasResult<AnalysisResult> {
    result.unwrap_or_else(|_| {
        error!("The {domain} pipeline panicked");
        Err(anyhow::anyhow!("The {domain} pipeline panicked").into())
    })
}

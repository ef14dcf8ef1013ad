//! Fixed column layouts of every raw table the pipelines consume, and the metric lists of each
//! domain. Column sets are known at compile time; frames are checked against them once, on entry.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::{
    error::{CovidAtlasError, CovidAtlasResult},
    COL,
};

/// Daily new cases and vaccinations, world domain.
pub const WORLD_METRICS: &[&str] = &[COL::WORLD_NEW_CASES, COL::WORLD_DAILY_VACCINATIONS];

/// Daily new cases and vaccinations, US domain.
pub const US_CASE_METRICS: &[&str] = &[COL::US_NEW_CASE, COL::US_DAILY_VACCINATIONS];

/// Cumulative deaths per ethnicity category (including the total).
pub const ETHNICITY_METRICS: &[&str] = &[
    COL::DEATHS_TOTAL,
    COL::DEATHS_WHITE,
    COL::DEATHS_BLACK,
    COL::DEATHS_LATINX,
    COL::DEATHS_ASIAN,
    COL::DEATHS_AIAN,
    COL::DEATHS_NHPI,
    COL::DEATHS_MULTIRACIAL,
    COL::DEATHS_OTHER,
    COL::DEATHS_UNKNOWN,
];

/// The synthetic total bracket of the age dataset. Never a column of any derived table.
pub const ALL_AGES: &str = "All Ages";

/// Demographic slice kept from the age dataset.
pub const ALL_SEXES: &str = "All Sexes";

/// Age brackets of the age dataset, excluding [`ALL_AGES`]. The CDC publishes overlapping
/// bracket schemes side by side; each becomes its own column.
pub const AGE_BRACKETS: &[&str] = &[
    "0-17 years",
    "1-4 years",
    "15-24 years",
    "18-29 years",
    "25-34 years",
    "30-39 years",
    "35-44 years",
    "40-49 years",
    "45-54 years",
    "5-14 years",
    "50-64 years",
    "55-64 years",
    "65-74 years",
    "75-84 years",
    "85 years and over",
    "Under 1 year",
];

/// Every metric of the consolidated US table, in output order.
pub fn us_metrics() -> Vec<&'static str> {
    US_CASE_METRICS
        .iter()
        .chain(ETHNICITY_METRICS)
        .chain(AGE_BRACKETS)
        .copied()
        .collect()
}

/// Required columns of a raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl TableSchema {
    /// Fails with `SchemaMismatch` on the first expected column that is absent.
    pub fn validate(&self, df: &DataFrame) -> CovidAtlasResult<()> {
        match self.columns.iter().find(|column| df.column(column).is_err()) {
            Some(column) => Err(CovidAtlasError::SchemaMismatch {
                table: self.name.to_string(),
                column: column.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Validates and projects `df` onto exactly the schema's columns, in schema order.
    pub fn select(&self, df: &DataFrame) -> CovidAtlasResult<DataFrame> {
        self.validate(df)?;
        Ok(df.select(self.columns.iter().copied())?)
    }
}

pub const WORLD_CASES_SCHEMA: TableSchema = TableSchema {
    name: "world_covid_data",
    columns: &[
        COL::WORLD_LOCATION,
        COL::WORLD_DATE,
        COL::WORLD_ISO_CODE,
        COL::WORLD_NEW_CASES,
    ],
};

pub const WORLD_VACCINATIONS_SCHEMA: TableSchema = TableSchema {
    name: "world_covid_vaccinations",
    columns: &[
        COL::WORLD_LOCATION,
        COL::WORLD_DATE,
        COL::WORLD_ISO_CODE,
        COL::WORLD_DAILY_VACCINATIONS,
    ],
};

pub const WORLD_POPULATION_SCHEMA: TableSchema = TableSchema {
    name: "world_population",
    columns: &[
        COL::WORLD_POP_LOCATION,
        COL::WORLD_POP_TIME,
        COL::WORLD_POP_VARIANT,
        COL::WORLD_POP_TOTAL,
    ],
};

pub const WORLD_MAP_SCHEMA: TableSchema = TableSchema {
    name: "world_countries_map",
    columns: &[COL::WORLD_MAP_ISO, COL::GEOMETRY],
};

pub const US_CASES_SCHEMA: TableSchema = TableSchema {
    name: "us_covid_data",
    columns: &[COL::US_STATE, COL::US_SUBMISSION_DATE, COL::US_NEW_CASE],
};

pub const US_VACCINATIONS_SCHEMA: TableSchema = TableSchema {
    name: "us_covid_vaccinations",
    columns: &[
        COL::US_VAX_LOCATION,
        COL::US_VAX_DATE,
        COL::US_DAILY_VACCINATIONS,
    ],
};

pub const US_ETHNICITY_DEATHS_SCHEMA: TableSchema = TableSchema {
    name: "us_covid_ethnicity_deaths",
    columns: &[
        COL::ETHNICITY_DATE,
        COL::ETHNICITY_STATE,
        COL::DEATHS_TOTAL,
        COL::DEATHS_WHITE,
        COL::DEATHS_BLACK,
        COL::DEATHS_LATINX,
        COL::DEATHS_ASIAN,
        COL::DEATHS_AIAN,
        COL::DEATHS_NHPI,
        COL::DEATHS_MULTIRACIAL,
        COL::DEATHS_OTHER,
        COL::DEATHS_UNKNOWN,
    ],
};

pub const US_AGE_DEATHS_SCHEMA: TableSchema = TableSchema {
    name: "us_covid_age_deaths",
    columns: &[
        COL::AGE_END_DATE,
        COL::AGE_STATE,
        COL::AGE_SEX,
        COL::AGE_GROUP,
        COL::AGE_COVID_DEATHS,
    ],
};

pub const US_MAP_SCHEMA: TableSchema = TableSchema {
    name: "us_states_map",
    columns: &[COL::US_MAP_STATE, COL::GEOMETRY],
};

pub const WORLD_IDENTIFIERS_SCHEMA: TableSchema = TableSchema {
    name: "world_country_identifiers",
    columns: &[COL::ID_NAME, COL::ID_ISO2, COL::ID_IDENTIFIER],
};

pub const STATE_IDENTIFIERS_SCHEMA: TableSchema = TableSchema {
    name: "us_state_identifiers",
    columns: &[COL::ID_NAME, COL::ID_IDENTIFIER],
};

/// Name of the US population estimate column for `year`.
pub fn us_population_estimate_column(year: i32) -> String {
    format!("{}{year}", COL::US_POP_ESTIMATE_PREFIX)
}

/// The schema of `us_population` depends on the reference year, so it is checked by hand.
pub fn validate_us_population(df: &DataFrame, year: i32) -> CovidAtlasResult<()> {
    let estimate = us_population_estimate_column(year);
    for column in [COL::US_POP_NAME, estimate.as_str()] {
        if df.column(column).is_err() {
            return Err(CovidAtlasError::SchemaMismatch {
                table: "us_population".into(),
                column: column.into(),
            });
        }
    }
    Ok(())
}

/// Presentation grouping of the metrics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MetricGroup {
    /// Cases and vaccinations.
    Common,
    Ethnicity,
    Age,
}

impl MetricGroup {
    pub fn of(metric: &str) -> Self {
        if ETHNICITY_METRICS.contains(&metric) {
            MetricGroup::Ethnicity
        } else if AGE_BRACKETS.contains(&metric) {
            MetricGroup::Age
        } else {
            MetricGroup::Common
        }
    }

    pub fn metrics(&self) -> &'static [&'static str] {
        match self {
            MetricGroup::Common => US_CASE_METRICS,
            MetricGroup::Ethnicity => ETHNICITY_METRICS,
            MetricGroup::Age => AGE_BRACKETS,
        }
    }
}

//! This module stores the column names of the raw datasets and of the derived tables. Raw names
//! must be kept in sync with the upstream publishers' CSV headers: a rename upstream is a
//! breaking change and surfaces as a schema mismatch.

// Shared columns of derived tables
pub const GEOMETRY: &str = "geometry";
pub const POPULATION: &str = "population";

// World cases (`world_covid_data`) and vaccinations (`world_covid_vaccinations`)
pub const WORLD_LOCATION: &str = "location";
pub const WORLD_DATE: &str = "date";
pub const WORLD_ISO_CODE: &str = "iso_code";
pub const WORLD_NEW_CASES: &str = "new_cases";
pub const WORLD_DAILY_VACCINATIONS: &str = "daily_vaccinations";

// World population (`world_population`), values in thousands of persons
pub const WORLD_POP_LOCATION: &str = "Location";
pub const WORLD_POP_TIME: &str = "Time";
pub const WORLD_POP_VARIANT: &str = "Variant";
pub const WORLD_POP_TOTAL: &str = "PopTotal";

// World countries map (`world_countries_map`), keyed by ISO 3166-1 alpha-2
pub const WORLD_MAP_ISO: &str = "ISO";

// US cases (`us_covid_data`)
pub const US_STATE: &str = "state";
pub const US_SUBMISSION_DATE: &str = "submission_date";
pub const US_NEW_CASE: &str = "new_case";

// US vaccinations (`us_covid_vaccinations`), keyed by state name
pub const US_VAX_LOCATION: &str = "location";
pub const US_VAX_DATE: &str = "date";
pub const US_DAILY_VACCINATIONS: &str = "daily_vaccinations";

// US deaths by ethnicity (`us_covid_ethnicity_deaths`), dates as YYYYMMDD
pub const ETHNICITY_DATE: &str = "Date";
pub const ETHNICITY_STATE: &str = "State";
pub const DEATHS_TOTAL: &str = "Deaths_Total";
pub const DEATHS_WHITE: &str = "Deaths_White";
pub const DEATHS_BLACK: &str = "Deaths_Black";
pub const DEATHS_LATINX: &str = "Deaths_Latinx";
pub const DEATHS_ASIAN: &str = "Deaths_Asian";
pub const DEATHS_AIAN: &str = "Deaths_AIAN";
pub const DEATHS_NHPI: &str = "Deaths_NHPI";
pub const DEATHS_MULTIRACIAL: &str = "Deaths_Multiracial";
pub const DEATHS_OTHER: &str = "Deaths_Other";
pub const DEATHS_UNKNOWN: &str = "Deaths_Unknown";

// US deaths by age (`us_covid_age_deaths`), long form, dates as M/D/YYYY, keyed by state name
pub const AGE_END_DATE: &str = "End Date";
pub const AGE_STATE: &str = "State";
pub const AGE_SEX: &str = "Sex";
pub const AGE_GROUP: &str = "Age Group";
pub const AGE_COVID_DEATHS: &str = "COVID-19 Deaths";

// US population (`us_population`); the estimate column is `POPESTIMATE<year>`
pub const US_POP_NAME: &str = "NAME";
pub const US_POP_ESTIMATE_PREFIX: &str = "POPESTIMATE";

// US states map (`us_states_map`)
pub const US_MAP_STATE: &str = "STATE";

// Identifier reference tables
pub const ID_NAME: &str = "Name";
pub const ID_ISO2: &str = "ISO2";
pub const ID_IDENTIFIER: &str = "Identifier";

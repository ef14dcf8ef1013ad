//! Translation between jurisdiction naming schemes and restriction of tables to a known set of
//! canonical codes.
//!
//! Translation never fails: a value that is neither a canonical code nor a mapping key passes
//! through unchanged and is reported. Tables must be passed through [`restrict_to_domain`]
//! afterwards, which is the only point where unknown identifiers are removed.

use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use itertools::Itertools;
use log::{debug, warn};
use polars::prelude::*;

use crate::{
    error::CovidAtlasResult,
    schema::{TableSchema, STATE_IDENTIFIERS_SCHEMA, WORLD_IDENTIFIERS_SCHEMA},
    COL,
};

/// Number of unresolved values quoted in the warning log.
const UNRESOLVED_SAMPLE: usize = 5;

/// Mapping from alternate names or codes to a canonical code.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierMapping {
    mapping: HashMap<String, String>,
    canonical: BTreeSet<String>,
}

/// Output of [`IdentifierMapping::translate`].
#[derive(Debug, Clone)]
pub struct Translation {
    pub series: Series,
    /// Distinct values that were neither canonical nor mapped, in sorted order.
    pub unresolved: Vec<String>,
}

impl IdentifierMapping {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut out = Self::default();
        for (from, to) in pairs {
            out.insert(from.into(), to.into());
        }
        out
    }

    /// Build a mapping from each of `source_columns` to `target_column`. Rows where either side
    /// is null are skipped; a later row overrides an earlier one with the same source value.
    pub fn from_columns(
        df: &DataFrame,
        source_columns: &[&str],
        target_column: &str,
    ) -> CovidAtlasResult<Self> {
        let target = df.column(target_column)?.cast(&DataType::String)?;
        let target = target.str()?;
        let mut out = Self::default();
        for source_column in source_columns {
            let source = df.column(source_column)?.cast(&DataType::String)?;
            for (from, to) in source.str()?.into_iter().zip(target.into_iter()) {
                if let (Some(from), Some(to)) = (from, to) {
                    out.insert(from.to_string(), to.to_string());
                }
            }
        }
        // Codes with no alternate name are still canonical
        out.canonical
            .extend(target.into_iter().flatten().map(str::to_string));
        debug!(
            "Built mapping onto `{target_column}` with {} keys and {} codes",
            out.mapping.len(),
            out.canonical.len()
        );
        Ok(out)
    }

    fn insert(&mut self, from: String, to: String) {
        self.canonical.insert(to.clone());
        self.mapping.insert(from, to);
    }

    pub fn is_canonical(&self, value: &str) -> bool {
        self.canonical.contains(value)
    }

    /// Resolve a single value, `None` when it is neither canonical nor mapped.
    pub fn resolve<'a>(&'a self, value: &'a str) -> Option<&'a str> {
        if self.is_canonical(value) {
            Some(value)
        } else {
            self.mapping.get(value).map(String::as_str)
        }
    }

    /// Replace every mapped value of a string series. Canonical codes are left as they are, which
    /// makes translation idempotent.
    pub fn translate(&self, series: &Series) -> CovidAtlasResult<Translation> {
        let mut unresolved = BTreeSet::new();
        let translated: StringChunked = series
            .str()?
            .into_iter()
            .map(|value| {
                value.map(|value| match self.resolve(value) {
                    Some(code) => code,
                    None => {
                        unresolved.insert(value.to_string());
                        value
                    }
                })
            })
            .collect();
        Ok(Translation {
            series: translated.with_name(series.name()).into_series(),
            unresolved: unresolved.into_iter().collect(),
        })
    }

    /// Return a copy of `df` with `column` translated. Unresolved values are kept and logged.
    pub fn translate_column(&self, df: &DataFrame, column: &str) -> CovidAtlasResult<DataFrame> {
        let source = df.column(column)?.cast(&DataType::String)?;
        let translation = self.translate(&source)?;
        if !translation.unresolved.is_empty() {
            warn!(
                "{} value(s) of `{column}` have no identifier mapping, e.g. [{}]",
                translation.unresolved.len(),
                translation
                    .unresolved
                    .iter()
                    .take(UNRESOLVED_SAMPLE)
                    .join(", ")
            );
        }
        let mut out = df.clone();
        out.with_column(translation.series)?;
        Ok(out)
    }

    /// The canonical codes as a series, usable with [`restrict_to_domain`].
    pub fn domain(&self) -> Series {
        Series::new(
            "domain",
            self.canonical.iter().map(String::as_str).collect_vec(),
        )
    }

    /// Every name or code that maps onto a canonical code.
    pub fn sources(&self) -> Series {
        Series::new(
            "sources",
            self.mapping.keys().sorted().map(String::as_str).collect_vec(),
        )
    }
}

/// Expression retaining rows whose `column` is one of the codes in `domain`.
pub fn in_domain(column: &str, domain: &Series) -> Expr {
    col(column).is_in(lit(domain.clone()))
}

/// Retain only rows of `df` whose `column` belongs to `domain`.
pub fn restrict_to_domain(
    df: &DataFrame,
    column: &str,
    domain: &Series,
) -> CovidAtlasResult<DataFrame> {
    let out = df
        .clone()
        .lazy()
        .filter(in_domain(column, domain))
        .collect()?;
    debug!(
        "Domain filter on `{column}` removed {} of {} rows",
        df.height() - out.height(),
        df.height()
    );
    Ok(out)
}

/// Read an identifier reference table. Every column is read as text so that codes such as
/// Namibia's `NA` survive.
pub fn load_identifier_table<P: AsRef<Path>>(
    path: P,
    schema: &TableSchema,
) -> CovidAtlasResult<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.as_ref().to_path_buf()))?
        .finish()?;
    schema.select(&df)
}

/// Country names and ISO 3166-1 alpha-2 codes onto alpha-3 codes.
pub fn world_identifier_mapping(df: &DataFrame) -> CovidAtlasResult<IdentifierMapping> {
    WORLD_IDENTIFIERS_SCHEMA.validate(df)?;
    IdentifierMapping::from_columns(df, &[COL::ID_NAME, COL::ID_ISO2], COL::ID_IDENTIFIER)
}

/// State names onto two-letter postal codes.
pub fn state_identifier_mapping(df: &DataFrame) -> CovidAtlasResult<IdentifierMapping> {
    STATE_IDENTIFIERS_SCHEMA.validate(df)?;
    IdentifierMapping::from_columns(df, &[COL::ID_NAME], COL::ID_IDENTIFIER)
}

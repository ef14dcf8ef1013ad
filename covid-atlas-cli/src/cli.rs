use std::{path::PathBuf, sync::Arc};

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use covid_atlas_core::{
    config::Config,
    datasets::{Datasets, Domain},
    formatters::{
        write_result, CSVFormatter, GeoJSONFormatter, GeoJSONSeqFormatter, OutputFormatter,
        ParquetFormatter,
    },
    schema::{us_metrics, WORLD_METRICS},
    CovidAtlas,
};
use enum_dispatch::enum_dispatch;
use itertools::Itertools;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use spinners::{Spinner, Spinners};
use strum::IntoEnumIterator;
use strum_macros::EnumString;

use crate::display::{display_datasets, display_summary};
use crate::error::{CovidAtlasCliError, CovidAtlasCliResult};

const DEFAULT_PROGRESS_SPINNER: Spinners = Spinners::Dots;
const COMPLETE_PROGRESS_STRING: &str = "✔";
const RUNNING_TAIL_STRING: &str = "...";
const LOADING_STRING: &str = "Loading datasets";

/// Defines the output formats we are able to produce data in.
#[derive(Clone, Debug, Deserialize, Serialize, EnumString, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum OutputFormat {
    GeoJSON,
    GeoJSONSeq,
    Csv,
    Parquet,
}

impl From<&OutputFormat> for OutputFormatter {
    fn from(value: &OutputFormat) -> Self {
        match value {
            OutputFormat::GeoJSON => OutputFormatter::GeoJSON(GeoJSONFormatter),
            OutputFormat::GeoJSONSeq => OutputFormatter::GeoJSONSeq(GeoJSONSeqFormatter),
            OutputFormat::Csv => OutputFormatter::Csv(CSVFormatter),
            OutputFormat::Parquet => OutputFormatter::Parquet(ParquetFormatter),
        }
    }
}

fn spinner(quiet: bool, message: &str) -> Option<Spinner> {
    (!quiet).then(|| {
        Spinner::with_timer(
            DEFAULT_PROGRESS_SPINNER,
            message.to_string() + RUNNING_TAIL_STRING,
        )
    })
}

fn stop(sp: Option<Spinner>) {
    if let Some(mut s) = sp {
        s.stop_with_symbol(COMPLETE_PROGRESS_STRING);
    }
}

/// Trait that defines what to run when a given subcommand is invoked.
#[enum_dispatch]
pub trait RunCommand {
    async fn run(&self, config: Config) -> CovidAtlasCliResult<()>;
}

/// Directory overrides shared by the subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct DirArgs {
    #[arg(long, help = "Directory holding the raw dataset files")]
    data_dir: Option<PathBuf>,
    #[arg(long, help = "Directory the derived tables are written to")]
    output_dir: Option<PathBuf>,
}

impl DirArgs {
    fn apply(&self, mut config: Config) -> Config {
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        config
    }
}

/// The `run` command executes the pipelines and writes the derived tables.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[arg(
        short = 'd',
        long,
        value_name = "world|us",
        help = "Only run this domain; both run when omitted"
    )]
    domain: Option<Domain>,
    #[arg(
        short = 'f',
        long,
        value_name = "geojson|geojsonseq|csv|parquet",
        default_value = "csv",
        help = "Output format of the by-jurisdiction table"
    )]
    output_format: OutputFormat,
    #[command(flatten)]
    dirs: DirArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl RunCommand for RunArgs {
    async fn run(&self, config: Config) -> CovidAtlasCliResult<()> {
        info!("Running `run` subcommand");
        let config = self.dirs.apply(config);
        let sp = spinner(self.quiet, LOADING_STRING);
        let atlas = Arc::new(CovidAtlas::new_with_config(config)?);
        stop(sp);

        let domains = match self.domain {
            Some(domain) => vec![domain],
            None => Domain::iter().collect_vec(),
        };
        let formatter: OutputFormatter = (&self.output_format).into();
        let sp = spinner(self.quiet, &format!("Running {}", domains.iter().join(" and ")));
        // Domains share nothing mutable, so each runs on its own blocking task
        let handles = domains
            .into_iter()
            .map(|domain| {
                let atlas = Arc::clone(&atlas);
                let formatter = formatter.clone();
                let handle = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<PathBuf>> {
                    let result = atlas.run(domain)?;
                    Ok(write_result(&atlas.config.output_dir, &result, &formatter)?)
                });
                (domain, handle)
            })
            .collect_vec();

        let mut written = vec![];
        let mut failed = vec![];
        for (domain, handle) in handles {
            match handle.await? {
                Ok(paths) => written.extend(paths),
                Err(err) => {
                    error!("The {domain} domain failed: {err:#}");
                    failed.push(domain.to_string());
                }
            }
        }
        stop(sp);

        for path in written {
            println!("{}", path.display());
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CovidAtlasCliError::DomainsFailed(failed.join(", ")))
        }
    }
}

/// The `summary` command lists the jurisdictions with the highest mean of a per-capita metric.
#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[arg(index = 1, value_name = "world|us")]
    domain: Domain,
    #[arg(
        short = 'm',
        long,
        help = "Metric to rank by; defaults to new cases"
    )]
    metric: Option<String>,
    #[arg(short = 'n', long, default_value_t = 10, help = "Number of jurisdictions to show")]
    top: usize,
    #[command(flatten)]
    dirs: DirArgs,
    #[arg(from_global)]
    quiet: bool,
}

impl SummaryCommand {
    fn metric(&self) -> CovidAtlasCliResult<String> {
        let metrics = match self.domain {
            Domain::World => WORLD_METRICS.to_vec(),
            Domain::Us => us_metrics(),
        };
        match &self.metric {
            None => Ok(metrics[0].to_string()),
            Some(metric) if metrics.contains(&metric.as_str()) => Ok(metric.clone()),
            Some(metric) => Err(anyhow!(
                "Unknown {} metric `{metric}`, expected one of: {}",
                self.domain,
                metrics.join(", ")
            )
            .into()),
        }
    }
}

impl RunCommand for SummaryCommand {
    async fn run(&self, config: Config) -> CovidAtlasCliResult<()> {
        info!("Running `summary` subcommand");
        let metric = self.metric()?;
        let config = self.dirs.apply(config);
        let sp = spinner(self.quiet, LOADING_STRING);
        let atlas = CovidAtlas::new_with_config(config)?;
        let result = atlas.run(self.domain)?;
        stop(sp);
        debug!("{:#?}", result.by_jurisdiction);
        display_summary(
            &result.by_jurisdiction,
            result.jurisdiction_key(),
            &metric,
            self.top,
        )?;
        Ok(())
    }
}

/// The `datasets` command reports which raw dataset files are present.
#[derive(Args, Debug)]
pub struct DatasetsCommand {
    #[command(flatten)]
    dirs: DirArgs,
}

impl RunCommand for DatasetsCommand {
    async fn run(&self, config: Config) -> CovidAtlasCliResult<()> {
        info!("Running `datasets` subcommand");
        let config = self.dirs.apply(config);
        println!("\nDatasets in {}:", config.data_dir.display());
        display_datasets(&Datasets::status(&config.data_dir));
        Ok(())
    }
}

/// The entrypoint for the CLI.
#[derive(Parser, Debug)]
#[command(version, about="Per-capita COVID-19 statistics for the world and the US", long_about = None, name="covid-atlas")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
    #[arg(
        short = 'c',
        long = "config",
        help = "Path of a TOML config file; defaults to `covid-atlas/config.toml` in the user config directory",
        global = true
    )]
    pub config: Option<PathBuf>,
    #[arg(
        short = 'q',
        long = "quiet",
        help = "\
            Do not print progress bar to stdout. Results and logs (when `RUST_LOG`\n\
            is set) will still be printed.",
        global = true
    )]
    quiet: bool,
}

/// Commands contains the list of subcommands avaliable for use in the CLI.
/// Each command should implmement the RunCommand trait and specify the list
/// of required args for that command.
#[derive(Subcommand, Debug)]
#[enum_dispatch(RunCommand)]
pub enum Commands {
    /// Run the pipelines and write per-capita, by-jurisdiction and by-date tables
    Run(RunArgs),
    /// Rank jurisdictions by a per-capita metric
    Summary(SummaryCommand),
    /// Show which raw datasets are present
    Datasets(DatasetsCommand),
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, str::FromStr};

    use super::*;

    fn write_us_fixture(root: &Path) -> Config {
        let data_dir = root.join("datasets");
        fs::create_dir(&data_dir).unwrap();
        let files = [
            (
                "us_covid_data.csv",
                "submission_date,state,new_case\n01/01/2021,CA,100\n01/02/2021,NY,40\n",
            ),
            (
                "us_covid_vaccinations.csv",
                "date,location,daily_vaccinations\n2021-01-01,California,20\n",
            ),
            (
                "us_covid_ethnicity_deaths.csv",
                "Date,State,Deaths_Total,Deaths_White,Deaths_Black,Deaths_Latinx,Deaths_Asian,\
                 Deaths_AIAN,Deaths_NHPI,Deaths_Multiracial,Deaths_Other,Deaths_Unknown\n\
                 20210102,CA,10,1,1,1,1,1,1,1,1,1\n",
            ),
            (
                "us_covid_age_deaths.csv",
                "End Date,State,Sex,Age Group,COVID-19 Deaths\n\
                 01/02/2021,New York,All Sexes,All Ages,30\n\
                 01/02/2021,New York,All Sexes,85 years and over,20\n",
            ),
            (
                "us_population.csv",
                "NAME,POPESTIMATE2020\nUnited States,330000\nCalifornia,1000\nNew York,2000\n",
            ),
            (
                "us_states_map.geojson",
                r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"STATE":"CA"},"geometry":{"type":"Point","coordinates":[-119.0,37.0]}}]}"#,
            ),
        ];
        for (name, contents) in files {
            fs::write(data_dir.join(name), contents).unwrap();
        }
        let world_identifiers = root.join("world_country_identifiers.csv");
        fs::write(&world_identifiers, "Name,ISO2,Identifier\nFrance,FR,FRA\n").unwrap();
        let state_identifiers = root.join("us_state_identifiers.csv");
        fs::write(
            &state_identifiers,
            "Name,Identifier\nCalifornia,CA\nNew York,NY\n",
        )
        .unwrap();
        Config {
            data_dir,
            output_dir: root.join("results"),
            world_identifiers,
            state_identifiers,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn run_command_should_write_us_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_us_fixture(dir.path());
        let run = RunArgs {
            domain: Some(Domain::Us),
            output_format: OutputFormat::GeoJSON,
            dirs: DirArgs::default(),
            quiet: true,
        };
        run.run(config).await.unwrap();
        let results = dir.path().join("results");
        for name in [
            "us_per_capita.csv",
            "us_by_jurisdiction.geojson",
            "us_by_date.csv",
            "us_by_date_ethnicity.csv",
            "us_by_date_age.csv",
        ] {
            assert!(results.join(name).exists(), "{name} should be written");
        }
    }

    #[tokio::test]
    async fn failed_domain_should_not_block_the_other() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_us_fixture(dir.path());
        let run = RunArgs {
            domain: None,
            output_format: OutputFormat::Csv,
            dirs: DirArgs::default(),
            quiet: true,
        };
        let err = run.run(config).await.unwrap_err();
        assert!(matches!(&err, CovidAtlasCliError::DomainsFailed(domains) if domains == "world"));
        assert!(dir.path().join("results").join("us_per_capita.csv").exists());
    }

    #[test]
    fn summary_metric_should_be_validated() {
        let summary = SummaryCommand {
            domain: Domain::Us,
            metric: Some("Under 1 year".into()),
            top: 5,
            dirs: DirArgs::default(),
            quiet: true,
        };
        assert_eq!(summary.metric().unwrap(), "Under 1 year");
        let summary = SummaryCommand {
            domain: Domain::World,
            metric: None,
            ..summary
        };
        assert_eq!(summary.metric().unwrap(), "new_cases");
        let summary = SummaryCommand {
            metric: Some("All Ages".into()),
            ..summary
        };
        assert!(summary.metric().is_err());
    }

    #[test]
    fn dir_args_should_override_config() {
        let dirs = DirArgs {
            data_dir: Some("/data".into()),
            output_dir: None,
        };
        let config = dirs.apply(Config::default());
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.output_dir, Config::default().output_dir);
    }

    #[test]
    fn output_type_should_deserialize_properly() {
        let output_format = OutputFormat::from_str("GeoJSON");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::GeoJSON,
            "geojson format should be parsed correctly"
        );
        let output_format = OutputFormat::from_str("GeoJson");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::GeoJSON,
            "parsing should be case insensitive"
        );
        let output_format = OutputFormat::from_str("parquet");
        assert_eq!(
            output_format.unwrap(),
            OutputFormat::Parquet,
            "correct variants should parse correctly"
        );
        let output_format = OutputFormat::from_str("flatgeobuf");
        assert!(output_format.is_err(), "non listed formats should fail");
    }

    #[test]
    fn cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}

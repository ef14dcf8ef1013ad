use std::{
    fs::File,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use enum_dispatch::enum_dispatch;
use geo::geometry::Geometry;
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use wkt::TryFromWkt;

use crate::{
    datasets::Domain,
    error::{CovidAtlasError, CovidAtlasResult},
    pipeline::AnalysisResult,
    schema::MetricGroup,
    COL,
};

/// Utility function to convert from polars `AnyValue` to `serde_json::Value`
fn any_value_to_json(value: &AnyValue) -> CovidAtlasResult<Value> {
    match value {
        AnyValue::Null => Ok(Value::Null),
        AnyValue::Boolean(b) => Ok(Value::Bool(*b)),
        AnyValue::String(s) => Ok(Value::String((*s).to_string())),
        AnyValue::Int32(n) => Ok(json!(*n)),
        AnyValue::Int64(n) => Ok(json!(*n)),
        AnyValue::UInt32(n) => Ok(json!(*n)),
        AnyValue::UInt64(n) => Ok(json!(*n)),
        AnyValue::Float32(n) => Ok(json!(*n)),
        AnyValue::Float64(n) => Ok(json!(*n)),
        other => Err(anyhow!("Failed to convert {other:?} to JSON").into()),
    }
}

/// Properties of each feature: every column except `geometry`, with dates as ISO text.
fn properties_frame(df: &DataFrame) -> CovidAtlasResult<DataFrame> {
    let columns = df
        .drop(COL::GEOMETRY)?
        .get_columns()
        .iter()
        .map(|s| match s.dtype() {
            DataType::Date => s.cast(&DataType::String),
            _ => Ok(s.clone()),
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok(DataFrame::new(columns)?)
}

/// One feature per row. A null geometry gives a feature with a null geometry so that
/// jurisdictions without a boundary are still reported.
fn features(df: &DataFrame) -> CovidAtlasResult<Vec<geojson::Feature>> {
    let geometry_col = df
        .column(COL::GEOMETRY)
        .map_err(|_| CovidAtlasError::MissingGeometry)?;
    let other_cols = properties_frame(df)?;
    let mut features = Vec::with_capacity(df.height());
    for (idx, geom) in geometry_col.str()?.into_iter().enumerate() {
        let geometry = match geom {
            Some(wkt_str) => {
                let geom: Geometry<f64> = Geometry::try_from_wkt_str(wkt_str).map_err(|err| {
                    CovidAtlasError::InvalidGeometry(format!("{wkt_str}: {err}"))
                })?;
                Some(geojson::Geometry::from(&geom))
            }
            None => None,
        };
        let mut properties = serde_json::Map::new();
        for col in other_cols.get_columns() {
            let val = any_value_to_json(&col.get(idx)?)?;
            properties.insert(col.name().to_string(), val);
        }
        features.push(geojson::Feature {
            bbox: None,
            geometry,
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }
    Ok(features)
}

/// Trait to define different output generators. `save` writes the serialized `DataFrame` to a
/// writer; `format` collects the same output into a string.
#[enum_dispatch]
pub trait OutputGenerator {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> CovidAtlasResult<()>;

    fn format(&self, df: &mut DataFrame) -> CovidAtlasResult<String> {
        let mut data: Vec<u8> = vec![];
        let mut buff = Cursor::new(&mut data);
        self.save(&mut buff, df)?;
        Ok(String::from_utf8(data).map_err(anyhow::Error::from)?)
    }

    fn extension(&self) -> &'static str;

    /// Whether frames must carry a `geometry` column.
    fn needs_geometry(&self) -> bool {
        false
    }
}

/// Enum of OutputFormatters, one for each output type
#[enum_dispatch(OutputGenerator)]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum OutputFormatter {
    GeoJSON(GeoJSONFormatter),
    GeoJSONSeq(GeoJSONSeqFormatter),
    Csv(CSVFormatter),
    Parquet(ParquetFormatter),
}

/// One GeoJSON feature per line
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GeoJSONSeqFormatter;

impl OutputGenerator for GeoJSONSeqFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> CovidAtlasResult<()> {
        for feature in features(df)? {
            writeln!(writer, "{feature}")?;
        }
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "geojsonl"
    }

    fn needs_geometry(&self) -> bool {
        true
    }
}

/// CSV, with geometry (if any) as WKT
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CSVFormatter;

impl OutputGenerator for CSVFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> CovidAtlasResult<()> {
        CsvWriter::new(writer).finish(df)?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ParquetFormatter;

impl OutputGenerator for ParquetFormatter {
    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> CovidAtlasResult<()> {
        ParquetWriter::new(writer).finish(df)?;
        Ok(())
    }

    fn format(&self, _df: &mut DataFrame) -> CovidAtlasResult<String> {
        Err(anyhow!("Parquet output is binary and cannot be formatted as text").into())
    }

    fn extension(&self) -> &'static str {
        "parquet"
    }
}

/// A GeoJSON `FeatureCollection`, built in memory
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GeoJSONFormatter;

impl OutputGenerator for GeoJSONFormatter {
    fn format(&self, df: &mut DataFrame) -> CovidAtlasResult<String> {
        let feature_collection = geojson::FeatureCollection {
            bbox: None,
            features: features(df)?,
            foreign_members: None,
        };
        Ok(feature_collection.to_string())
    }

    fn save(&self, writer: &mut impl Write, df: &mut DataFrame) -> CovidAtlasResult<()> {
        let result = self.format(df)?;
        writer.write_all(result.as_bytes())?;
        Ok(())
    }

    fn extension(&self) -> &'static str {
        "geojson"
    }

    fn needs_geometry(&self) -> bool {
        true
    }
}

fn save_to(
    dir: &Path,
    name: &str,
    formatter: &OutputFormatter,
    df: &DataFrame,
) -> CovidAtlasResult<PathBuf> {
    let path = dir.join(format!("{name}.{}", formatter.extension()));
    let mut file = File::create(&path)?;
    formatter.save(&mut file, &mut df.clone())?;
    info!("Wrote {:?} to {}", df.shape(), path.display());
    Ok(path)
}

/// Write every derived table of `result` to `dir`, returning the paths written.
///
/// The by-jurisdiction table is written with `formatter`. The other tables have no geometry, so
/// they are written as CSV when `formatter` is a geographic format.
pub fn write_result(
    dir: &Path,
    result: &AnalysisResult,
    formatter: &OutputFormatter,
) -> CovidAtlasResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let tabular = if formatter.needs_geometry() {
        OutputFormatter::Csv(CSVFormatter)
    } else {
        formatter.clone()
    };
    let domain = result.domain;
    let mut written = vec![
        save_to(dir, &format!("{domain}_per_capita"), &tabular, &result.per_capita)?,
        save_to(
            dir,
            &format!("{domain}_by_jurisdiction"),
            formatter,
            &result.by_jurisdiction,
        )?,
        save_to(dir, &format!("{domain}_by_date"), &tabular, &result.by_date)?,
    ];
    if domain == Domain::Us {
        for group in [MetricGroup::Ethnicity, MetricGroup::Age] {
            let view = result.by_date_view(group)?;
            written.push(save_to(
                dir,
                &format!("{domain}_by_date_{group}"),
                &tabular,
                &view,
            )?);
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, pipeline};

    fn test_df() -> DataFrame {
        df!(
            "state" => &["CA", "NY", "TX"],
            "new_case" => &[2.0, 3.0, 4.0],
            "geometry" => &[Some("POINT (0 0)"), Some("POINT (20 20)"), None]
        )
        .unwrap()
    }

    #[test]
    fn geojson_formatter_should_keep_rows_without_geometry() {
        let output = GeoJSONFormatter.format(&mut test_df()).unwrap();
        let collection = geojson::FeatureCollection::try_from(
            output.parse::<geojson::GeoJson>().unwrap(),
        )
        .unwrap();
        assert_eq!(collection.features.len(), 3);
        let first = &collection.features[0];
        assert_eq!(first.property("state"), Some(&json!("CA")));
        assert_eq!(first.property("new_case"), Some(&json!(2.0)));
        assert!(first.property("geometry").is_none());
        assert!(first.geometry.is_some());
        assert!(collection.features[2].geometry.is_none());
    }

    #[test]
    fn geojsonseq_formatter_should_write_one_feature_per_line() {
        let output = GeoJSONSeqFormatter.format(&mut test_df()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(r#""coordinates":[20.0,20.0]"#));
        assert!(lines[2].contains(r#""geometry":null"#));
    }

    #[test]
    fn csv_formatter_should_work() {
        let output = CSVFormatter.format(&mut test_df()).unwrap();
        let correct_str = [
            "state,new_case,geometry",
            "CA,2.0,POINT (0 0)",
            "NY,3.0,POINT (20 20)",
            "TX,4.0,",
            "",
        ]
        .join("\n");
        assert_eq!(output, correct_str, "Output should be correct");
    }

    #[test]
    fn geographic_formats_should_require_geometry() {
        let mut df = df!("state" => &["CA"], "new_case" => &[1.0]).unwrap();
        assert!(matches!(
            GeoJSONFormatter.format(&mut df),
            Err(CovidAtlasError::MissingGeometry)
        ));
        assert!(CSVFormatter.format(&mut df).is_ok());
    }

    #[test]
    fn invalid_wkt_should_be_reported() {
        let mut df = df!("state" => &["CA"], "geometry" => &["POINT (0"]).unwrap();
        assert!(matches!(
            GeoJSONSeqFormatter.format(&mut df),
            Err(CovidAtlasError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn write_result_should_write_every_table() {
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline::us_pipeline(
            &pipeline::tests::datasets(),
            &pipeline::tests::reference(),
            &Config::default(),
        )
        .unwrap();
        let formatter = OutputFormatter::GeoJSON(GeoJSONFormatter);
        let written = write_result(dir.path(), &result, &formatter).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "us_per_capita.csv",
                "us_by_jurisdiction.geojson",
                "us_by_date.csv",
                "us_by_date_ethnicity.csv",
                "us_by_date_age.csv"
            ]
        );
        assert!(written.iter().all(|path| path.exists()));
    }

    #[test]
    fn parquet_should_round_trip_per_capita() {
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline::world_pipeline(
            &pipeline::tests::datasets(),
            &pipeline::tests::reference(),
            &Config::default(),
        )
        .unwrap();
        let written = write_result(
            dir.path(),
            &result,
            &OutputFormatter::Parquet(ParquetFormatter),
        )
        .unwrap();
        assert_eq!(written.len(), 3);
        let file = File::open(&written[0]).unwrap();
        let read = ParquetReader::new(file).finish().unwrap();
        assert!(read.equals_missing(&result.per_capita));
    }
}

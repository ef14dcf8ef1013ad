//! Jurisdiction boundaries: loading them from GeoJSON into `(key, geometry)` frames and attaching
//! them to aggregated tables. Geometry is carried through polars as WKT text.

use std::{fs::File, io::BufReader, io::Read, path::Path};

use geo::geometry::Geometry;
use geojson::{FeatureCollection, GeoJson};
use log::{debug, info};
use polars::prelude::*;
use serde_json::Value;
use wkt::ToWkt;

use crate::{
    error::{CovidAtlasError, CovidAtlasResult},
    COL,
};

fn key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a GeoJSON `FeatureCollection` into a frame of `id_property` (as text) and WKT
/// `geometry`. Features without the property or without a geometry are kept with a null in that
/// column.
pub fn read_geometries<R: Read>(reader: R, id_property: &str) -> CovidAtlasResult<DataFrame> {
    let collection = FeatureCollection::try_from(
        GeoJson::from_reader(reader).map_err(geojson::Error::from)?,
    )?;
    let mut keys: Vec<Option<String>> = Vec::with_capacity(collection.features.len());
    let mut geometries: Vec<Option<String>> = Vec::with_capacity(collection.features.len());
    for feature in collection.features {
        keys.push(feature.property(id_property).and_then(key_to_string));
        let geometry = match feature.geometry {
            Some(geometry) => {
                let geometry: Geometry<f64> = geometry
                    .try_into()
                    .map_err(|err: geojson::Error| CovidAtlasError::InvalidGeometry(err.to_string()))?;
                Some(geometry.wkt_string())
            }
            None => None,
        };
        geometries.push(geometry);
    }
    debug!("Read {} features keyed by `{id_property}`", keys.len());
    Ok(DataFrame::new(vec![
        Series::new(id_property, keys),
        Series::new(COL::GEOMETRY, geometries),
    ])?)
}

pub fn read_geometries_from_path<P: AsRef<Path>>(
    path: P,
    id_property: &str,
) -> CovidAtlasResult<DataFrame> {
    let file = File::open(path)?;
    read_geometries(BufReader::new(file), id_property)
}

/// Left join of `geometry` onto `table`: every row of `table` is kept, with a null geometry where
/// no key matches. When a key appears more than once in `geometry` the first row is used.
pub fn attach_geometry(
    table: &DataFrame,
    geometry: &DataFrame,
    key_in_table: &str,
    key_in_geometry: &str,
) -> CovidAtlasResult<DataFrame> {
    let geometry = geometry
        .clone()
        .lazy()
        .select([col(key_in_geometry), col(COL::GEOMETRY)])
        .filter(col(key_in_geometry).is_not_null())
        .unique_stable(
            Some(vec![key_in_geometry.to_string()]),
            UniqueKeepStrategy::First,
        );
    let out = table
        .clone()
        .lazy()
        .join(
            geometry,
            [col(key_in_table)],
            [col(key_in_geometry)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    info!(
        "Attached geometry to {} of {} rows",
        out.height() - out.column(COL::GEOMETRY)?.null_count(),
        out.height()
    );
    Ok(out)
}

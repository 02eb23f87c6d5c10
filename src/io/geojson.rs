use std::{fs::File, io::BufWriter, path::Path};

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{json, Map, Value};

fn ring_json(ring: &LineString<f64>) -> Value {
    Value::Array(ring.coords().map(|c| json!([c.x, c.y])).collect())
}

/// GeoJSON `MultiPolygon` geometry: each polygon is `[exterior, hole, ...]`.
pub fn multipolygon_json(mp: &MultiPolygon<f64>) -> Value {
    let polygons = mp.0.iter()
        .map(|polygon| {
            let mut rings = vec![ring_json(polygon.exterior())];
            rings.extend(polygon.interiors().iter().map(ring_json));
            Value::Array(rings)
        })
        .collect::<Vec<_>>();

    json!({
        "type": "MultiPolygon",
        "coordinates": polygons,
    })
}

pub fn feature(mp: &MultiPolygon<f64>, properties: Map<String, Value>) -> Value {
    feature_json(multipolygon_json(mp), properties)
}

/// A feature with a `null` geometry, for records that must be listed without a polygon.
pub fn null_feature(properties: Map<String, Value>) -> Value {
    feature_json(Value::Null, properties)
}

fn feature_json(geometry: Value, properties: Map<String, Value>) -> Value {
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": properties,
    })
}

/// Write a FeatureCollection to `path`.
pub fn write_feature_collection(path: &Path, features: Vec<Value>) -> Result<()> {
    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    let file = File::create(path)
        .with_context(|| format!("[io::geojson] Failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &collection)
        .with_context(|| format!("[io::geojson] Failed to write {}", path.display()))
}

/// Read every polygonal feature of a FeatureCollection with its properties.
/// Features with a `null` geometry are skipped.
pub fn read_feature_collection(path: &Path) -> Result<Vec<(Map<String, Value>, MultiPolygon<f64>)>> {
    let file = File::open(path)
        .with_context(|| format!("[io::geojson] Failed to open {}", path.display()))?;
    let value: Value = serde_json::from_reader(file)
        .with_context(|| format!("[io::geojson] Failed to parse {}", path.display()))?;

    let features = value["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson] {} is not a FeatureCollection", path.display()))?;

    features.iter()
        .filter(|feature| !feature["geometry"].is_null())
        .map(|feature| {
            let properties = feature["properties"].as_object().cloned().unwrap_or_default();
            let geometry = &feature["geometry"];
            let coords = geometry["coordinates"].as_array()
                .ok_or_else(|| anyhow!("[io::geojson] feature without coordinates"))?;
            let mp = match geometry["type"].as_str() {
                Some("MultiPolygon") => MultiPolygon(coords.iter().map(parse_polygon).collect::<Result<_>>()?),
                Some("Polygon") => MultiPolygon(vec![parse_polygon(&geometry["coordinates"])?]),
                other => bail!("[io::geojson] unsupported geometry type {other:?}"),
            };
            Ok((properties, mp))
        })
        .collect()
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value.as_array()
        .ok_or_else(|| anyhow!("[io::geojson] polygon is not an array of rings"))?
        .iter()
        .map(parse_ring)
        .collect::<Result<Vec<_>>>()?;
    let mut rings = rings.into_iter();
    let exterior = rings.next()
        .ok_or_else(|| anyhow!("[io::geojson] polygon without exterior ring"))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    value.as_array()
        .ok_or_else(|| anyhow!("[io::geojson] ring is not an array"))?
        .iter()
        .map(|pair| match (pair[0].as_f64(), pair[1].as_f64()) {
            (Some(x), Some(y)) => Ok(Coord { x, y }),
            _ => bail!("[io::geojson] invalid coordinate {pair}"),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holes_are_written_as_extra_rings() {
        let exterior = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)]);
        let mp = MultiPolygon(vec![Polygon::new(exterior, vec![hole])]);

        let geometry = multipolygon_json(&mp);
        assert_eq!(geometry["type"], "MultiPolygon");
        assert_eq!(geometry["coordinates"][0].as_array().unwrap().len(), 2);
        assert_eq!(geometry["coordinates"][0][1][0], json!([1.0, 1.0]));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shape.geojson");
        let mut properties = Map::new();
        properties.insert("adm2_id".into(), json!("USA_1_1"));
        write_feature_collection(&path, vec![feature(&mp, properties)]).unwrap();

        let features = read_feature_collection(&path).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].0["adm2_id"], "USA_1_1");
        assert_eq!(features[0].1, mp);
    }
}

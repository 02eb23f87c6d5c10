use anyhow::{bail, Result};
use geo::{BooleanOps, Coord, LineString, MultiPolygon, Polygon};
use shapefile::{PolygonRing, Shape};

/// Convert the rings of a shapefile polygon into a `geo::MultiPolygon<f64>`.
/// Shapefile stores each outer ring followed by its holes.
fn rings_to_geo<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
        if let (Some(&first), Some(&last)) = (coords.first(), coords.last()) {
            if first != last { coords.push(first) }
        }
    }

    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes: Vec<LineString<f64>> = Vec::new();

    for ring in rings {
        let mut coords = ring.points().iter()
            .map(|p| { let (x, y) = xy(p); Coord { x, y } })
            .collect::<Vec<_>>();
        ensure_closed(&mut coords);

        match ring {
            PolygonRing::Outer(_) => {
                if let Some(ext) = exterior.take() {
                    polys.push(Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(LineString(coords));
            }
            PolygonRing::Inner(_) => holes.push(LineString(coords)),
        }
    }
    if let Some(ext) = exterior {
        polys.push(Polygon::new(ext, holes));
    }

    MultiPolygon(polys)
}

/// Convert a shapefile shape into a MultiPolygon; null shapes become an empty MultiPolygon.
pub fn shape_to_multipolygon(shape: Shape) -> Result<MultiPolygon<f64>> {
    Ok(match shape {
        Shape::Polygon(p) => rings_to_geo(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonM(p) => rings_to_geo(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonZ(p) => rings_to_geo(p.rings(), |pt| (pt.x, pt.y)),
        Shape::NullShape => MultiPolygon(vec![]),
        other => bail!("expected a polygon shape, found {:?}", other.shapetype()),
    })
}

/// True when the geometry carries no polygon with a non-degenerate exterior.
pub fn is_empty_geometry(mp: &MultiPolygon<f64>) -> bool {
    mp.0.iter().all(|poly| poly.exterior().0.len() < 4)
}

/// Union a set of MultiPolygons. Returns an empty MultiPolygon when given nothing.
pub fn union_all<'a>(shapes: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> MultiPolygon<f64> {
    shapes.into_iter()
        .filter(|mp| !is_empty_geometry(mp))
        .cloned()
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| MultiPolygon(vec![]))
}

#[cfg(test)]
pub(crate) fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon<f64> {
    MultiPolygon(vec![geo::Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 }).to_polygon()])
}

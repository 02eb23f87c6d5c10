use crate::error::LinkError;

/// Logical fields the pipeline reads from its input tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Iso,
    Adm1Id,
    Adm1Name,
    Adm2Id,
    Adm2Name,
    ObjectId,
    IrId,
    RegionKey,
    IsTerminal,
    GadmIds,
    Population,
    Year,
    SampleX,
    SampleY,
}

impl Field {
    pub fn to_str(&self) -> &'static str {
        match self {
            Field::Iso => "iso",
            Field::Adm1Id => "adm1_id",
            Field::Adm1Name => "adm1_name",
            Field::Adm2Id => "adm2_id",
            Field::Adm2Name => "adm2_name",
            Field::ObjectId => "object_id",
            Field::IrId => "ir_id",
            Field::RegionKey => "region_key",
            Field::IsTerminal => "is_terminal",
            Field::GadmIds => "gadm_ids",
            Field::Population => "population",
            Field::Year => "year",
            Field::SampleX => "x",
            Field::SampleY => "y",
        }
    }
}

/// Declares which physical column names may carry a field, in priority order.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub field: Field,
    pub candidates: &'static [&'static str],
    pub required: bool,
}

const fn required(field: Field, candidates: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { field, candidates, required: true }
}

const fn optional(field: Field, candidates: &'static [&'static str]) -> ColumnSpec {
    ColumnSpec { field, candidates, required: false }
}

const ISO_NAMES: &[&str] = &["ISO", "iso", "GID_0", "country", "COUNTRY"];
const ADM1_NAMES: &[&str] = &["NAME_1", "ADM1_NAME", "NAME_1_EN"];
const ADM2_NAMES: &[&str] = &["NAME_2", "ADM2_NAME", "NAME_2_EN"];

/// GADM attribute table (`gadm2.csv`), keyed by object id.
pub const GADM_TABLE: &[ColumnSpec] = &[
    required(Field::ObjectId, &["OBJECTID", "objectid", "object_id"]),
    required(Field::Iso, ISO_NAMES),
    required(Field::Adm1Id, &["ID_1"]),
    optional(Field::Adm1Name, ADM1_NAMES),
    required(Field::Adm2Id, &["ID_2"]),
    optional(Field::Adm2Name, ADM2_NAMES),
];

/// IR hierarchy table (`hierarchy.csv`).
pub const HIERARCHY_TABLE: &[ColumnSpec] = &[
    required(Field::IsTerminal, &["is_terminal"]),
    required(Field::GadmIds, &["gadmid"]),
    required(Field::IrId, &["agglomid"]),
    optional(Field::RegionKey, &["region-key", "region_key"]),
];

/// IR to ADM2 link file written by the linker (`ir_to_adm2_adm1.csv`).
/// ADM columns must exist but are null on rows whose object id had no GADM match.
pub const LINK_TABLE: &[ColumnSpec] = &[
    required(Field::IrId, &["agglomid"]),
    optional(Field::RegionKey, &["region-key", "region_key"]),
    required(Field::ObjectId, &["OBJECTID"]),
    required(Field::Iso, ISO_NAMES),
    required(Field::Adm1Id, &["ID_1"]),
    optional(Field::Adm1Name, ADM1_NAMES),
    required(Field::Adm2Id, &["ID_2"]),
    optional(Field::Adm2Name, ADM2_NAMES),
];

/// Per-year population table (`population_by_adm2_<year>.csv`).
pub const POPULATION_TABLE: &[ColumnSpec] = &[
    required(Field::Iso, ISO_NAMES),
    required(Field::Adm1Id, &["ID_1"]),
    optional(Field::Adm1Name, ADM1_NAMES),
    required(Field::Adm2Id, &["ID_2"]),
    optional(Field::Adm2Name, ADM2_NAMES),
    required(Field::Population, &["population", "sum"]),
    optional(Field::Year, &["year"]),
];

/// Attribute records of the GADM polygon shapefile.
pub const GADM_SHAPES: &[ColumnSpec] = &[
    required(Field::Iso, ISO_NAMES),
    required(Field::Adm1Id, &["ID_1"]),
    required(Field::Adm1Name, ADM1_NAMES),
    required(Field::Adm2Id, &["ID_2"]),
    required(Field::Adm2Name, ADM2_NAMES),
];

/// Attribute records of the IR polygon shapefile.
pub const IR_SHAPES: &[ColumnSpec] = &[
    required(Field::IrId, &["color", "agglomid"]),
    optional(Field::Iso, ISO_NAMES),
    optional(Field::RegionKey, &["hierid", "region-key", "region_key"]),
];

/// Cell-centre samples of a population raster.
pub const RASTER_SAMPLES: &[ColumnSpec] = &[
    required(Field::SampleX, &["x", "lon", "longitude"]),
    required(Field::SampleY, &["y", "lat", "latitude"]),
    required(Field::Population, &["value", "population", "sum"]),
];

/// Result of matching a table's physical columns against a list of specs.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    columns: Vec<(Field, Option<String>)>,
}

impl ResolvedSchema {
    /// Pick the first available candidate for every spec.
    /// Fails loudly on a required field with no match; optional misses resolve to `None`.
    pub fn negotiate(table: &str, available: &[&str], specs: &[ColumnSpec]) -> Result<Self, LinkError> {
        let columns = specs.iter()
            .map(|spec| {
                let found = spec.candidates.iter()
                    .find_map(|&name| available.iter().find(|&&col| col.trim() == name))
                    .map(|&col| col.to_string());
                match (found, spec.required) {
                    (None, true) => Err(LinkError::MissingColumn {
                        table: table.to_string(),
                        field: spec.field.to_str(),
                        candidates: spec.candidates.to_vec(),
                    }),
                    (found, _) => Ok((spec.field, found)),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { columns })
    }

    /// Physical column name resolved for `field`, if any.
    pub fn column(&self, field: Field) -> Option<&str> {
        self.columns.iter()
            .find(|(f, _)| *f == field)
            .and_then(|(_, col)| col.as_deref())
    }

    pub fn resolved(&self) -> impl Iterator<Item = (Field, &str)> {
        self.columns.iter().filter_map(|(f, col)| col.as_deref().map(|col| (*f, col)))
    }
}

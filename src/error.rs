use thiserror::Error;

/// Failures raised while reconciling regions and assembling arrays.
///
/// Row-level variants (`MissingIdentifier`, `IndexResolution`, `EmptyGeometry`)
/// are collected into stage reports and never abort a run on their own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// No candidate column name matched a required field.
    #[error("table {table:?}: none of the columns {candidates:?} is present for field {field}")]
    MissingColumn {
        table: String,
        field: &'static str,
        candidates: Vec<&'static str>,
    },

    /// A required key column is null or unparseable on one row.
    #[error("row {row}: missing or invalid identifier {field} ({detail})")]
    MissingIdentifier {
        row: usize,
        field: &'static str,
        detail: String,
    },

    /// An ADM2 key that cannot be matched to any ADM1 key.
    #[error("ADM2 {adm2} has no ADM1 parent {adm1}")]
    OrphanEntity { adm2: String, adm1: String },

    /// A relation references a key or index outside the assigned index space.
    #[error("relation IR {ir} -> ADM2 {adm2} cannot be resolved: {detail}")]
    IndexResolution {
        ir: String,
        adm2: String,
        detail: String,
    },

    /// A geometry lookup or union produced nothing.
    #[error("ADM2 {adm2}: no geometry ({detail})")]
    EmptyGeometry { adm2: String, detail: String },

    /// Two source rows target the same cell with different values.
    #[error("conflicting values for {entity} in year {year}: {existing} vs {incoming}")]
    DuplicateAssignment {
        entity: String,
        year: i32,
        existing: f64,
        incoming: f64,
    },

    /// An entity set that must not be empty has no members.
    #[error("index space {0} is empty")]
    EmptyIndexSpace(&'static str),
}

impl LinkError {
    /// Short label used when counting errors by kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LinkError::MissingColumn { .. } => "MissingColumn",
            LinkError::MissingIdentifier { .. } => "MissingIdentifier",
            LinkError::OrphanEntity { .. } => "OrphanEntity",
            LinkError::IndexResolution { .. } => "IndexResolutionError",
            LinkError::EmptyGeometry { .. } => "EmptyGeometryResult",
            LinkError::DuplicateAssignment { .. } => "DuplicateAssignment",
            LinkError::EmptyIndexSpace(_) => "EmptyIndexSpace",
        }
    }
}

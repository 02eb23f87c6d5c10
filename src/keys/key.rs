use std::{fmt, sync::Arc};

/// ISO 3166 alpha-3 country code, trimmed and uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iso(Arc<str>);

impl Iso {
    /// Canonicalize a raw code; blank input yields `None`.
    pub fn new(raw: &str) -> Option<Self> {
        let code = raw.trim();
        if code.is_empty() { return None }
        Some(Self(Arc::from(code.to_ascii_uppercase())))
    }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Iso {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Natural key of a first-level administrative region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Adm1Key {
    pub iso: Iso,
    pub adm1: i64,
}

impl fmt::Display for Adm1Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.iso, self.adm1)
    }
}

/// Natural key of a second-level administrative region.
/// Displays as the `ISO_ID1_ID2` identifier used in the exported files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Adm2Key {
    pub iso: Iso,
    pub adm1: i64,
    pub adm2: i64,
}

impl Adm2Key {
    pub fn new(iso: Iso, adm1: i64, adm2: i64) -> Self { Self { iso, adm1, adm2 } }

    /// The ADM1 key this ADM2 nominally belongs to.
    pub fn parent(&self) -> Adm1Key {
        Adm1Key { iso: self.iso.clone(), adm1: self.adm1 }
    }
}

impl fmt::Display for Adm2Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.iso, self.adm1, self.adm2)
    }
}

/// Impact Region identifier (`agglomid`). Stored as an integer so that the
/// hierarchy table (integer) and the IR shapefile (float `color`) join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrId(pub i64);

impl fmt::Display for IrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// GADM feature object id (`OBJECTID`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Attributes of an ADM2 region as carried by the GADM and population tables.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmAttrs {
    pub key: Adm2Key,
    pub adm1_name: Option<Arc<str>>,
    pub adm2_name: Option<Arc<str>>,
}

/// Parse an integer that may have been written as a float (`"12"`, `"12.0"`, `" 12 "`).
pub fn parse_integral(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(v) = s.parse::<i64>() { return Some(v) }
    let v = s.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15).then_some(v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_is_trimmed_and_uppercased() {
        assert_eq!(Iso::new("  usa ").unwrap().as_str(), "USA");
        assert!(Iso::new("   ").is_none());
    }

    #[test]
    fn integral_accepts_float_text() {
        assert_eq!(parse_integral("7"), Some(7));
        assert_eq!(parse_integral(" 7.0 "), Some(7));
        assert_eq!(parse_integral("-3"), Some(-3));
        assert_eq!(parse_integral("7.5"), None);
        assert_eq!(parse_integral("NaN"), None);
        assert_eq!(parse_integral(""), None);
    }

    #[test]
    fn adm2_display_matches_export_id() {
        let key = Adm2Key::new(Iso::new("mex").unwrap(), 4, 12);
        assert_eq!(key.to_string(), "MEX_4_12");
        assert_eq!(key.parent().to_string(), "MEX_4");
    }
}

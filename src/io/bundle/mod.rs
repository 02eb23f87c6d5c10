//! Array bundle: a directory of little-endian arrays, a CSR incidence matrix and
//! metadata CSVs, described by `manifest.json`.

mod manifest;
mod read;
mod source;
mod write;

pub use manifest::{FileHash, Manifest, Variable};
pub use read::{read_bundle, read_bundle_source};
pub use source::{BundleSink, BundleSource, DiskBundle, MemBundle};
pub use write::{write_bundle, write_bundle_sink};

/// Bundle-relative file paths.
pub mod files {
    pub const YEARS: &str = "arrays/years.i32.bin";
    pub const POPULATION: &str = "arrays/population.f64.bin";
    pub const ADM2_TO_ADM1: &str = "arrays/adm2_to_adm1.i32.bin";
    pub const IR_TO_ADM2: &str = "sparse/ir_to_adm2.csr.bin";
    pub const ADM2_META: &str = "meta/adm2.csv";
    pub const ADM1_META: &str = "meta/adm1.csv";
    pub const IR_META: &str = "meta/agglomid.csv";
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array1};

    use super::*;
    use crate::assemble::{ArrayBundle, Incidence, MISSING};

    fn bundle() -> ArrayBundle {
        ArrayBundle {
            years: vec![2010, 2020],
            population: array![[1.5, MISSING], [0.0, 7.0], [3.0, 4.0]],
            adm2_to_adm1: Array1::from(vec![0, 0, 1]),
            ir_to_adm2: Incidence::from_rows(3, vec![vec![0, 1], vec![2]]).unwrap(),
            iso: vec!["USA".into(), "USA".into(), "MEX".into()],
            adm2_id1: vec![1, 1, 4],
            adm2_id2: vec![10, 11, 12],
            adm2_name: vec!["Autauga".into(), "".into(), "Centro, Norte".into()],
            adm1_name: vec!["".into(), "Jalisco".into()],
            ir_id: vec![7, 9],
            ir_region_key: vec!["USA.1.10".into(), "".into()],
        }
    }

    fn same(a: &ArrayBundle, b: &ArrayBundle) {
        let bits = |b: &ArrayBundle| b.population.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(a), bits(b));
        assert_eq!(a.years, b.years);
        assert_eq!(a.adm2_to_adm1, b.adm2_to_adm1);
        assert_eq!(a.ir_to_adm2, b.ir_to_adm2);
        assert_eq!(a.iso, b.iso);
        assert_eq!(a.adm2_id2, b.adm2_id2);
        assert_eq!(a.adm2_name, b.adm2_name);
        assert_eq!(a.adm1_name, b.adm1_name);
        assert_eq!(a.ir_id, b.ir_id);
        assert_eq!(a.ir_region_key, b.ir_region_key);
    }

    #[test]
    fn memory_bundle_lists_every_file_in_the_manifest() {
        let mut sink = MemBundle::new();
        let manifest = write_bundle_sink(&bundle(), &mut sink).unwrap();

        assert_eq!(manifest.dimension("adm2"), 3);
        assert_eq!(manifest.dimension("agglomid"), 2);
        assert_eq!(manifest.variables["population"].dims, vec!["adm2", "year"]);
        assert_eq!(manifest.files.len(), 7);
        assert!(sink.has("manifest.json"));
        assert_eq!(sink.get(files::YEARS).unwrap().len(), 8);

        same(&read_bundle_source(&sink).unwrap(), &bundle());
    }

    #[test]
    fn tampered_file_fails_checksum() {
        let mut sink = MemBundle::new();
        write_bundle_sink(&bundle(), &mut sink).unwrap();
        sink.put(files::ADM2_TO_ADM1, &[0u8; 12]).unwrap();

        let err = read_bundle_source(&sink).unwrap_err();
        assert!(format!("{err:#}").contains("checksum mismatch"));
    }

    #[test]
    fn disk_bundle_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/bundle");

        write_bundle(&bundle(), &path, 0).unwrap();
        std::fs::write(path.join("stale.txt"), b"old").unwrap();
        write_bundle(&bundle(), &path, 0).unwrap();

        assert!(!path.join("stale.txt").exists());
        same(&read_bundle(&path).unwrap(), &bundle());

        let leftovers = std::fs::read_dir(dir.path().join("out")).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn inconsistent_bundle_is_not_written() {
        let mut bad = bundle();
        bad.adm2_to_adm1 = Array1::from(vec![0, 5, 1]);
        assert!(write_bundle_sink(&bad, &mut MemBundle::new()).is_err());
    }
}

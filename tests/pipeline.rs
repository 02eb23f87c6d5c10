use std::{fs, path::Path};

use impact_regions::{
    io::{bundle::read_bundle, csv::read_csv_text, geojson::read_feature_collection},
    pipeline::{bundle_stage, link_stage, read_links, relation_stage},
    export::write_links,
    run_pipeline, Case, DuplicatePolicy, PipelineConfig, RelationStats,
};
use shapefile::{
    dbase::{FieldName, FieldValue, Record, TableWriterBuilder},
    Point, Polygon, PolygonRing, Writer,
};

const HIERARCHY: &str = "\
# Impact region hierarchy, \"draft
# generated for tests, v2
region-key,is_terminal,gadmid,agglomid
World,False,,
USA.1.1,True,1,100
USA.1.2,True,2 3,101
USA.1.3,True,3,102
USA.2,True,4 1,103
MEX.1,True,5 6,104
XXX,True,99,105
";

const GADM: &str = "\
OBJECTID,GID_0,ID_1,NAME_1,ID_2,NAME_2
1,USA,1,Alabama,1,Autauga
2,USA,1,Alabama,2,Baldwin
3,USA,1,Alabama,3,Barbour
4,USA,2,Alaska,4,Aleutians
5,MEX,1,Jalisco,1,Centro
6,MEX,1,Jalisco,2,Norte
6,MEX,9,Other,9,Other
";

const POP_2010: &str = "\
ISO,ID_1,ADM1_NAME,ID_2,ADM2_NAME,population
USA,1,Alabama,1,Autauga,100
USA,1,Alabama,2,Baldwin,200
USA,1,Alabama,3,Barbour,
MEX,1,Jalisco,1,Centro,50
MEX,1,Jalisco,1,Centro,25
USA,2,Alaska,4,Aleutians,10
";

const POP_2020: &str = "\
ISO,ID_1,ADM1_NAME,ID_2,ADM2_NAME,population
USA,1,Alabama,1,Autauga,110
USA,1,Alabama,2,Baldwin,220
USA,1,Alabama,3,Barbour,330
MEX,1,Jalisco,1,Centro,80
USA,2,Alaska,4,Aleutians,0
MEX,1,Jalisco,2,Norte,40
";

fn write_tables(dir: &Path) {
    fs::write(dir.join("hierarchy.csv"), HIERARCHY).unwrap();
    fs::write(dir.join("gadm2.csv"), GADM).unwrap();
    fs::create_dir_all(dir.join("population")).unwrap();
    fs::write(dir.join("population/population_by_adm2_2010.csv"), POP_2010).unwrap();
    fs::write(dir.join("population/population_by_adm2_2020.csv"), POP_2020).unwrap();
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x0, y0),
        Point::new(x0, y1),
        Point::new(x1, y1),
        Point::new(x1, y0),
        Point::new(x0, y0),
    ]))
}

fn field(name: &str) -> FieldName {
    FieldName::try_from(name).unwrap()
}

fn write_gadm_shapes(path: &Path) {
    let builder = TableWriterBuilder::new()
        .add_character_field(field("GID_0"), 3)
        .add_numeric_field(field("ID_1"), 10, 0)
        .add_character_field(field("NAME_1"), 20)
        .add_numeric_field(field("ID_2"), 10, 0)
        .add_character_field(field("NAME_2"), 20);
    let mut writer = Writer::from_path(path, builder).unwrap();

    let features = [
        ("USA", 1, "Alabama", 1, "Autauga", square(0.0, 0.0, 1.0, 1.0)),
        ("USA", 1, "Alabama", 2, "Baldwin", square(1.0, 0.0, 2.0, 1.0)),
        ("USA", 1, "Alabama", 3, "Barbour", square(2.0, 0.0, 3.0, 1.0)),
        ("USA", 2, "Alaska", 4, "Aleutians", square(0.0, 1.0, 3.0, 2.0)),
        ("MEX", 1, "Jalisco", 1, "Centro", square(10.0, 0.0, 11.0, 1.0)),
        ("MEX", 1, "Jalisco", 2, "Norte", square(11.0, 0.0, 12.0, 1.0)),
    ];
    for (iso, id1, name1, id2, name2, shape) in features {
        let mut record = Record::default();
        record.insert("GID_0".into(), FieldValue::Character(Some(iso.into())));
        record.insert("ID_1".into(), FieldValue::Numeric(Some(id1 as f64)));
        record.insert("NAME_1".into(), FieldValue::Character(Some(name1.into())));
        record.insert("ID_2".into(), FieldValue::Numeric(Some(id2 as f64)));
        record.insert("NAME_2".into(), FieldValue::Character(Some(name2.into())));
        writer.write_shape_and_record(&shape, &record).unwrap();
    }
}

fn write_ir_shapes(path: &Path) {
    let builder = TableWriterBuilder::new()
        .add_numeric_field(field("color"), 12, 1)
        .add_character_field(field("ISO"), 3)
        .add_character_field(field("hierid"), 20);
    let mut writer = Writer::from_path(path, builder).unwrap();

    let features = [
        (100, "USA", "USA.1.1", square(0.0, 0.0, 1.0, 1.0)),
        (101, "USA", "USA.1.2", square(1.0, 0.0, 3.0, 1.0)),
        (102, "USA", "USA.1.3", square(2.5, 0.0, 3.0, 1.0)),
        (103, "USA", "USA.2", square(0.0, 1.0, 3.0, 2.0)),
        (104, "MEX", "MEX.1", square(10.0, 0.0, 12.0, 1.0)),
    ];
    for (ir, iso, hierid, shape) in features {
        let mut record = Record::default();
        record.insert("color".into(), FieldValue::Numeric(Some(ir as f64)));
        record.insert("ISO".into(), FieldValue::Character(Some(iso.into())));
        record.insert("hierid".into(), FieldValue::Character(Some(hierid.into())));
        writer.write_shape_and_record(&shape, &record).unwrap();
    }
}

fn config(dir: &Path, countries: Option<&[&str]>) -> PipelineConfig {
    PipelineConfig {
        hierarchy: dir.join("hierarchy.csv"),
        hierarchy_skip_rows: 2,
        gadm_table: dir.join("gadm2.csv"),
        population_dir: dir.join("population"),
        gadm_shapes: dir.join("gadm.shp"),
        ir_shapes: dir.join("ir.shp"),
        output_dir: dir.join("out"),
        countries: countries.map(|c| c.iter().map(|s| s.to_string()).collect()),
        duplicate_policy: DuplicatePolicy::Sum,
        overwrite: false,
    }
}

#[test]
fn link_file_and_stats_match_the_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());

    let links = link_stage(&dir.path().join("hierarchy.csv"), 2, &dir.path().join("gadm2.csv"), 0).unwrap();
    assert_eq!(links.rows.len(), 9);
    assert_eq!(links.unmatched().count(), 1);
    assert_eq!(links.duplicate_object_ids, 1);

    let path = write_links(&links, &dir.path().join("out")).unwrap();
    let reread = read_links(&path).unwrap();
    assert_eq!(reread.rows, links.rows);

    let stats = RelationStats::from_links(&reread);
    assert_eq!(
        (stats.total_irs, stats.total_adm2, stats.adm2_with_multiple_irs, stats.irs_with_multiple_adm2),
        (6, 6, 2, 3),
    );
}

#[test]
fn bundle_stage_builds_consistent_arrays() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());

    let links = link_stage(&dir.path().join("hierarchy.csv"), 2, &dir.path().join("gadm2.csv"), 0).unwrap();
    let relations = relation_stage(&links, None, 0);
    assert_eq!(relations.problematic.len(), 1);
    assert_eq!(relations.problematic[0].ir.0, 103);

    let stage = bundle_stage(&relations, &dir.path().join("population"), DuplicatePolicy::Sum, 0).unwrap();
    assert!(stage.assembly.dropped.is_empty());
    assert_eq!(stage.population.invalid, 1);
    assert_eq!(stage.population.merged, 1);

    let bundle = &stage.assembly.bundle;
    assert_eq!((bundle.adm2_count(), bundle.adm1_count(), bundle.year_count(), bundle.ir_count()), (6, 3, 2, 4));
    assert_eq!(bundle.years, vec![2010, 2020]);
    assert_eq!(bundle.ir_id, vec![100, 101, 102, 104]);
    assert_eq!(bundle.adm2_to_adm1.to_vec(), vec![0, 0, 0, 1, 2, 1]);
    assert_eq!(bundle.ir_to_adm2.row_sums(), vec![1, 2, 1, 2]);

    // USA_1_3 has no 2010 value; MEX_1_1 2010 rows are summed; MEX_1_2 only exists in 2020.
    assert!(bundle.population[[2, 0]].is_nan());
    assert_eq!(bundle.population[[3, 0]], 75.0);
    assert!(bundle.population[[5, 0]].is_nan());
    assert_eq!(bundle.population[[4, 1]], 0.0);

    let rejected = bundle_stage(&relations, &dir.path().join("population"), DuplicatePolicy::Reject, 0);
    assert!(rejected.is_err());
}

#[test]
fn full_run_writes_every_output() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    write_gadm_shapes(&dir.path().join("gadm.shp"));
    write_ir_shapes(&dir.path().join("ir.shp"));

    let config = config(dir.path(), None);
    let report = run_pipeline(&config, 0).unwrap();

    assert_eq!(report.links, 9);
    assert_eq!(report.unmatched_links, 1);
    assert_eq!(report.problematic_irs, 1);
    assert_eq!(report.dimensions, [6, 3, 2, 4]);
    assert_eq!(report.case_counts, [4, 1, 0, 1]);
    assert_eq!(report.duplicates_dropped, 3);
    assert_eq!(report.missing_geometries, 0);

    let out = dir.path().join("out");
    let stats = read_csv_text(&out.join("ir_adm_stats.csv"), 0).unwrap();
    assert_eq!(stats.height(), 4);
    assert!(out.join("ir_to_adm2_adm1.csv").exists());
    assert!(out.join("geometries/missing_geometries.csv").exists());

    let bundle = read_bundle(&out.join("bundle")).unwrap();
    assert_eq!(bundle.iso, vec!["USA", "USA", "USA", "MEX", "USA", "MEX"]);
    assert_eq!(bundle.adm2_name[0], "Autauga");

    let geojson = out.join("geojson");
    let usa = read_feature_collection(&geojson.join("USA_adm2.geojson")).unwrap();
    assert_eq!(usa.len(), 4);
    let case_of = |id: &str| usa.iter()
        .find(|(props, _)| props["adm2_id"] == id)
        .map(|(props, _)| props["case_type"].as_str().unwrap().to_string())
        .unwrap();
    assert_eq!(case_of("USA_1_1"), Case::IrEqualsAdm2.label());
    assert_eq!(case_of("USA_1_3"), Case::IrSpansAdm2s.label());
    assert_eq!(case_of("USA_2_4"), Case::NoIr.label());

    assert_eq!(read_feature_collection(&geojson.join("MEX_adm2.geojson")).unwrap().len(), 2);
    assert_eq!(read_feature_collection(&geojson.join("USA_ir.geojson")).unwrap().len(), 4);
    assert!(geojson.join("ir_problematic/USA_ir_problematic.geojson").exists());
    assert_eq!(fs::read_to_string(geojson.join("export_log.txt")).unwrap(), "");
}

#[test]
fn country_filter_restricts_geometry_outputs() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    write_gadm_shapes(&dir.path().join("gadm.shp"));
    write_ir_shapes(&dir.path().join("ir.shp"));

    let report = run_pipeline(&config(dir.path(), Some(&["mex"])), 0).unwrap();
    assert_eq!(report.case_counts, [2, 0, 0, 0]);
    assert_eq!(report.dimensions[3], 1);

    let geojson = dir.path().join("out/geojson");
    assert!(geojson.join("MEX_adm2.geojson").exists());
    assert!(!geojson.join("USA_adm2.geojson").exists());
    assert!(!geojson.join("USA_ir.geojson").exists());
    assert_eq!(fs::read_to_string(geojson.join("export_log.txt")).unwrap(), "");
}

#[test]
fn rerun_keeps_existing_geojson_unless_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    write_tables(dir.path());
    write_gadm_shapes(&dir.path().join("gadm.shp"));
    write_ir_shapes(&dir.path().join("ir.shp"));

    let mut config = config(dir.path(), Some(&["MEX"]));
    run_pipeline(&config, 0).unwrap();
    let mex = dir.path().join("out/geojson/MEX_adm2.geojson");
    fs::write(&mex, "{}").unwrap();

    let report = run_pipeline(&config, 0).unwrap();
    assert_eq!(report.exports.adm2_skipped, 1);
    assert_eq!(fs::read_to_string(&mex).unwrap(), "{}");

    config.overwrite = true;
    run_pipeline(&config, 0).unwrap();
    assert_eq!(read_feature_collection(&mex).unwrap().len(), 2);
}

use anyhow::Result;
use impact_regions::pipeline::{export_stage, geometry_stage, parse_countries, read_links, relation_stage};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::GeojsonArgs) -> Result<()> {
    super::assert_not_stdout(&args.output)?;
    let countries = args.countries.as_deref().map(parse_countries).transpose()?;
    let countries = countries.as_deref();

    let links = read_links(&args.links)?;
    let relations = relation_stage(&links, countries, cli.verbose);
    let geometry = geometry_stage(&args.gadm_shapes, &args.ir_shapes, countries, cli.verbose)?;

    let expected = links.countries().into_iter()
        .filter(|iso| countries.is_none_or(|countries| countries.contains(iso)))
        .collect::<Vec<_>>();
    let geojson_dir = args.output.join("geojson");
    let (classification, exports) = export_stage(
        &relations, &geometry, &expected, &args.output, &geojson_dir, args.overwrite, cli.verbose,
    )?;

    let [c1, c2, c3, c4] = classification.counts();
    println!("[geojson] cases: 1={c1} 2={c2} 3={c3} 4={c4}, {} missing geometries", classification.missing.len());
    println!(
        "[geojson] {} ADM2 files ({} skipped), {} IR files -> {}",
        exports.adm2_files, exports.adm2_skipped, exports.ir_files, geojson_dir.display(),
    );
    Ok(())
}

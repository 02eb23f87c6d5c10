use anyhow::Result;
use impact_regions::{
    extract_population,
    io::{csv::read_csv_text, fs::ensure_dir_exists, population::write_population, shp::read_gadm_shapes},
    GridRaster,
};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::PopulationArgs) -> Result<()> {
    let out_dir = super::output_dir(args.output.as_deref())?;
    ensure_dir_exists(&out_dir)?;

    let raster = GridRaster::from_dataframe(&read_csv_text(&args.raster, 0)?)?;
    if cli.verbose > 0 { eprintln!("[population] {} raster cells from {}", raster.len(), args.raster.display()); }

    let (gadm, rejected) = read_gadm_shapes(&args.gadm_shapes, cli.verbose)?;
    let records = extract_population(&gadm, &raster, args.year, cli.verbose);
    let path = write_population(&out_dir, args.year, &records)?;

    println!(
        "[population] {} ADM2 rows ({} features rejected) -> {}",
        records.len(), rejected.len(), path.display(),
    );
    Ok(())
}

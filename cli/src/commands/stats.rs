use anyhow::Result;
use impact_regions::{export::write_stats, pipeline::read_links, RelationStats};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::StatsArgs) -> Result<()> {
    let out_dir = super::output_dir(args.output.as_deref())?;

    let links = read_links(&args.links)?;
    let stats = RelationStats::from_links(&links);
    let path = write_stats(&stats, &out_dir)?;
    if cli.verbose > 0 { eprintln!("[stats] {} link rows read from {}", links.rows.len(), args.links.display()); }

    println!("Total IRs: {}", stats.total_irs);
    println!("Total ADM2s: {}", stats.total_adm2);
    println!("ADM2s with multiple IRs: {}", stats.adm2_with_multiple_irs);
    println!("IRs covering multiple ADM2s: {}", stats.irs_with_multiple_adm2);
    println!("[stats] -> {}", path.display());
    Ok(())
}

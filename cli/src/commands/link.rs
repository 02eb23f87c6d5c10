use anyhow::Result;
use impact_regions::{export::write_links, pipeline::link_stage};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::LinkArgs) -> Result<()> {
    let out_dir = super::output_dir(args.output.as_deref())?;

    let links = link_stage(&args.hierarchy, args.skip_rows, &args.gadm, cli.verbose)?;
    let path = write_links(&links, &out_dir)?;

    println!(
        "[link] {} links ({} unmatched, {} rejected rows) -> {}",
        links.rows.len(), links.unmatched().count(), links.rejected.len(), path.display(),
    );
    Ok(())
}

use anyhow::Result;
use impact_regions::{
    io::bundle::write_bundle,
    pipeline::{bundle_stage, parse_countries, read_links, relation_stage},
    DuplicatePolicy,
};

use crate::cli::Policy;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::BundleArgs) -> Result<()> {
    super::assert_not_stdout(&args.output)?;
    let countries = args.countries.as_deref().map(parse_countries).transpose()?;
    let policy = match args.duplicates {
        Policy::Sum => DuplicatePolicy::Sum,
        Policy::Reject => DuplicatePolicy::Reject,
    };

    let links = read_links(&args.links)?;
    let relations = relation_stage(&links, countries.as_deref(), cli.verbose);
    let stage = bundle_stage(&relations, &args.population, policy, cli.verbose)?;
    write_bundle(&stage.assembly.bundle, &args.output, cli.verbose)?;

    let bundle = &stage.assembly.bundle;
    println!(
        "[bundle] adm2={} adm1={} year={} agglomid={} ({} relations dropped) -> {}",
        bundle.adm2_count(), bundle.adm1_count(), bundle.year_count(), bundle.ir_count(),
        stage.assembly.dropped.len(), args.output.display(),
    );
    Ok(())
}

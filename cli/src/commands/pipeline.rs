use anyhow::Result;
use impact_regions::{run_pipeline, PipelineConfig};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::RunArgs) -> Result<()> {
    let config = PipelineConfig::from_json_file(&args.config)?;
    super::assert_not_stdout(&config.output_dir)?;

    if cli.verbose > 0 { eprintln!("[run] config={} -> {}", args.config.display(), config.output_dir.display()); }
    let report = run_pipeline(&config, cli.verbose)?;

    println!("{report}");
    Ok(())
}

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{bundle, geojson, link, pipeline, population, stats};

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    match &cli.command {
        Commands::Link(args) => link::run(&cli, args),
        Commands::Stats(args) => stats::run(&cli, args),
        Commands::Population(args) => population::run(&cli, args),
        Commands::Bundle(args) => bundle::run(&cli, args),
        Commands::Geojson(args) => geojson::run(&cli, args),
        Commands::Run(args) => pipeline::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }

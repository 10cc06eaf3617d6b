use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
struct Args {
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (chart, model) = psim_runner::load_model_from_path(args.path)?;
    println!("title={}", chart.meta.title);
    println!("artist={}", chart.meta.artist);
    println!("version={}", chart.meta.version);
    println!("columns={}", model.columns());
    println!("notes={}", model.note_count());
    println!("events={}", model.len());
    Ok(())
}

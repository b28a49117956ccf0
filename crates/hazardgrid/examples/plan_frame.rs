use hazardgrid::{FileFrameSource, NoopDebugSink, PathMessage, Pipeline, PipelineConfig, PipelineOutcome};
use std::error::Error;
use std::path::Path;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <frame.png> [config.json] [out.json]", args[0]);
        std::process::exit(2);
    }

    let config = match args.get(2) {
        Some(p) => PipelineConfig::from_json_file(Path::new(p))?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(config)?;
    let mut source = FileFrameSource::new(&args[1]);
    let outcome = pipeline.run_source(&mut source, &mut NoopDebugSink)?;

    let report = match outcome {
        PipelineOutcome::Planned(r) => r,
        PipelineOutcome::NoHazard => {
            println!("No hazard in frame.");
            return Ok(());
        }
    };
    println!(
        "Path {:?} -> {:?} with {} cells (rectified: {}).",
        report.start,
        report.goal,
        report.path.len(),
        report.rectified
    );

    if let Some(out_path) = args.get(3) {
        let json = PathMessage::from_path(&report.path).to_json()?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}

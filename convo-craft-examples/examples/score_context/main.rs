use std::io::BufRead;

use anyhow::Result;
use clap::Parser;
use convo_craft_examples::{get_device, DeviceOption};
use convo_craft_pipelines::ForecastPipeline;

/// Score a conversation typed line by line: after each utterance, print the
/// probability that the conversation derails from here.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Repository id or local directory of the pretrained model checkpoint.
    #[arg(short, long, env = "CRAFT_MODEL")]
    model: String,

    /// The device to run the model on.
    #[arg(short, long, default_value = "cpu")]
    device: DeviceOption,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let device = get_device(&cli.device)?;
    let pipeline = ForecastPipeline::new(cli.model.as_str(), &device, None, None)?;

    let mut context: Vec<String> = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        context.push(line);
        let score = pipeline.run(&context)?;
        println!("p(derailment) = {score:.4}");
    }

    Ok(())
}

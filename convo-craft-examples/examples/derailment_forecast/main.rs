use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use convo_craft_corpus::Corpus;
use convo_craft_examples::{get_device, DeviceOption};
use convo_craft_pipelines::{ForecastOptions, ForecastPipeline};

/// Forecast conversational derailment over a labeled corpus and display the
/// highest-risk utterances.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Repository id or local directory of the pretrained model checkpoint.
    #[arg(short, long, env = "CRAFT_MODEL")]
    model: String,

    /// Dataset id or local directory of the conversation corpus.
    #[arg(short, long, env = "CRAFT_CORPUS")]
    corpus: String,

    /// Only score conversations whose `split` metadata matches.
    #[arg(long, default_value = "test")]
    split: String,

    /// Probability above which a context is labeled as derailing.
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,

    /// Number of rows of the summary table to display.
    #[arg(long, default_value_t = 20)]
    top: usize,

    /// The device to run the model on.
    #[arg(short, long, default_value = "cpu")]
    device: DeviceOption,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let device = get_device(&cli.device)?;
    println!("Device: {:?}", device);

    let pipeline = ForecastPipeline::new(cli.model.as_str(), &device, None, None)
        .with_context(|| format!("loading model from '{}'", cli.model))?;

    let mut corpus = if Path::new(&cli.corpus).is_dir() {
        Corpus::from_dir(&cli.corpus)
    } else {
        Corpus::from_pretrained(&cli.corpus, None)
    }
    .with_context(|| format!("loading corpus from '{}'", cli.corpus))?;
    println!(
        "Corpus: {} conversations, {} utterances",
        corpus.num_conversations(),
        corpus.num_utterances()
    );

    let options = ForecastOptions {
        threshold: cli.threshold,
        ..Default::default()
    };
    let scored = pipeline.transform(
        &mut corpus,
        |conversation| conversation.meta().get_str("split") == Some(cli.split.as_str()),
        |utterance| !utterance.meta.get_bool("is_section_header").unwrap_or(false),
        &options,
    )?;
    println!("Scored {} utterances in the '{}' split", scored, cli.split);

    let summary = pipeline.summarize(&corpus, &options);
    println!();
    println!(
        "{:<28} {:<28} {:<12} {:>8}",
        "utterance", "conversation", "label", "score"
    );
    for row in summary.iter().take(cli.top) {
        println!(
            "{:<28} {:<28} {:<12} {:>8.4}",
            row.utterance_id, row.conversation_id, row.label, row.score
        );
    }

    // compare the conversation-level forecast against the ground-truth label
    let mut correct = 0;
    let mut total = 0;
    for conversation in
        corpus.filter_conversations(|c| c.meta().get_str("split") == Some(cli.split.as_str()))
    {
        let Some(truth) = conversation
            .meta()
            .get_bool("conversation_has_personal_attack")
        else {
            continue;
        };
        let forecast = corpus.utterances_of(conversation).iter().any(|utterance| {
            utterance
                .meta
                .get_f64(&options.score_key)
                .map(|score| score > cli.threshold as f64)
                .unwrap_or(false)
        });
        total += 1;
        if forecast == truth {
            correct += 1;
        }
    }
    if total > 0 {
        println!();
        println!("Conversation-level agreement with labels: {correct}/{total}");
    }

    Ok(())
}

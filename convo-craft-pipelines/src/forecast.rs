use candle_core::{DType, Device, Tensor};
use candle_nn::ops::sigmoid;
use convo_craft::{Error, FromPretrainedParameters, Result};
use convo_craft_corpus::{Conversation, Corpus, Utterance};
use convo_craft_models::{AutoModelForForecasting, ForwardParams, PreTrainedModel};
use convo_craft_tokenizers::{CraftTokenizer, DialogEncoding};

pub const DEFAULT_SCORE_KEY: &str = "forecast_score";
pub const DEFAULT_LABEL_KEY: &str = "forecast_label";

/// Options of a forecast sweep over a corpus.
#[derive(Debug, Clone)]
pub struct ForecastOptions {
    /// Number of context windows scored per forward pass.
    pub batch_size: usize,
    /// Probability above which a context is labeled as derailing.
    pub threshold: f32,
    /// Metadata key the score is written to.
    pub score_key: String,
    /// Metadata key the label is written to.
    pub label_key: String,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            batch_size: 64,
            threshold: 0.5,
            score_key: DEFAULT_SCORE_KEY.to_string(),
            label_key: DEFAULT_LABEL_KEY.to_string(),
        }
    }
}

/// A single scored utterance: the probability that the conversation derails
/// once this utterance arrives, computed from the utterances preceding it.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceForecast {
    pub utterance_id: String,
    pub conversation_id: String,
    pub label: String,
    pub score: f32,
}

struct ForecastJob {
    target_id: String,
    context: Vec<String>,
}

/// A pipeline for forecasting conversational derailment.
pub struct ForecastPipeline {
    model: Box<dyn PreTrainedModel>,
    tokenizer: CraftTokenizer,
    device: Device,
}

impl ForecastPipeline {
    /// Creates a new `ForecastPipeline`.
    ///
    /// # Arguments
    ///
    /// * `identifier` - The repository id or checkpoint directory of the model to load.
    /// * `device` - The device to run the model on.
    /// * `dtype` - The numeric type in which the model parameters should be loaded.
    /// * `params` - Optional parameters to specify the revision, user agent, and auth token.
    ///
    /// # Returns
    ///
    /// The `ForecastPipeline` instance.
    pub fn new<S: AsRef<str> + Copy>(
        identifier: S,
        device: &Device,
        dtype: Option<DType>,
        params: Option<FromPretrainedParameters>,
    ) -> Result<Self> {
        let model =
            AutoModelForForecasting::from_pretrained(identifier, device, dtype, params.clone())?;
        let tokenizer = CraftTokenizer::from_pretrained(identifier, params)?;
        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
        })
    }

    fn preprocess(&self, contexts: &[Vec<String>]) -> Result<DialogEncoding> {
        let mut encoding = self.tokenizer.encode_dialogs(contexts)?;
        encoding.to_device(&self.device)?;
        Ok(encoding)
    }

    fn postprocess(&self, logits: &Tensor) -> Result<Vec<f32>> {
        Ok(sigmoid(logits)?.to_vec1::<f32>()?)
    }

    fn scores(&self, contexts: &[Vec<String>]) -> Result<Vec<f32>> {
        let encoding = self.preprocess(contexts)?;
        let output = self.model.forward(ForwardParams::from(&encoding))?;
        let logits = output
            .get_logits()
            .ok_or_else(|| Error::msg("model produced no logits"))?;
        self.postprocess(logits)
    }

    fn label_of(&self, score: f32, threshold: f32) -> String {
        let config = self.model.config();
        if score > threshold {
            config.label_for(1).unwrap_or("attack").to_string()
        } else {
            config.label_for(0).unwrap_or("no_attack").to_string()
        }
    }

    /// Scores a single conversational context: the probability that the
    /// conversation derails after these utterances.
    pub fn run<S: AsRef<str>>(&self, context: &[S]) -> Result<f32> {
        let context: Vec<String> = context.iter().map(|s| s.as_ref().to_string()).collect();
        Ok(self.scores(&[context])?[0])
    }

    /// Scores the selected utterances of one conversation without touching
    /// the corpus, returning one row per forecast target in conversation
    /// order.
    pub fn predict<U>(
        &self,
        corpus: &Corpus,
        conversation: &Conversation,
        utterance_selector: U,
        options: &ForecastOptions,
    ) -> Result<Vec<UtteranceForecast>>
    where
        U: Fn(&Utterance) -> bool,
    {
        let utterances: Vec<&Utterance> = corpus
            .utterances_of(conversation)
            .into_iter()
            .filter(|u| utterance_selector(u))
            .collect();
        let contexts: Vec<Vec<String>> = (1..utterances.len())
            .map(|idx| utterances[..idx].iter().map(|u| u.text.clone()).collect())
            .collect();

        let mut rows = Vec::with_capacity(contexts.len());
        let mut target = 1;
        for batch in contexts.chunks(options.batch_size.max(1)) {
            for score in self.scores(batch)? {
                let utterance = utterances[target];
                rows.push(UtteranceForecast {
                    utterance_id: utterance.id.clone(),
                    conversation_id: utterance.conversation_id.clone(),
                    label: self.label_of(score, options.threshold),
                    score,
                });
                target += 1;
            }
        }
        Ok(rows)
    }

    /// Sweeps the corpus: for every conversation accepted by
    /// `conversation_selector`, scores the context preceding each utterance
    /// kept by `utterance_selector`, and writes score and label into the
    /// target utterance's metadata.
    ///
    /// The first kept utterance of a conversation replies to nothing and is
    /// never a target. Returns the number of scored utterances.
    pub fn transform<C, U>(
        &self,
        corpus: &mut Corpus,
        conversation_selector: C,
        utterance_selector: U,
        options: &ForecastOptions,
    ) -> Result<usize>
    where
        C: Fn(&Conversation) -> bool,
        U: Fn(&Utterance) -> bool,
    {
        let jobs = collect_jobs(corpus, &conversation_selector, &utterance_selector);
        tracing::debug!(windows = jobs.len(), "collected context windows");

        let mut scored = 0;
        for batch in jobs.chunks(options.batch_size.max(1)) {
            let contexts: Vec<Vec<String>> = batch.iter().map(|job| job.context.clone()).collect();
            let scores = self.scores(&contexts)?;
            for (job, score) in batch.iter().zip(scores) {
                let label = self.label_of(score, options.threshold);
                if let Some(utterance) = corpus.utterance_mut(&job.target_id) {
                    utterance.meta.insert(&options.score_key, score as f64);
                    utterance.meta.insert(&options.label_key, label);
                    scored += 1;
                }
            }
        }

        tracing::info!(scored, "forecast sweep finished");
        Ok(scored)
    }

    /// Collects the annotations written by `transform` into rows sorted by
    /// score, descending.
    pub fn summarize(&self, corpus: &Corpus, options: &ForecastOptions) -> Vec<UtteranceForecast> {
        let mut rows: Vec<UtteranceForecast> = corpus
            .iter_utterances()
            .filter_map(|utterance| {
                let score = utterance.meta.get_f64(&options.score_key)? as f32;
                let label = match utterance.meta.get_str(&options.label_key) {
                    Some(label) => label.to_string(),
                    None => self.label_of(score, options.threshold),
                };
                Some(UtteranceForecast {
                    utterance_id: utterance.id.clone(),
                    conversation_id: utterance.conversation_id.clone(),
                    label,
                    score,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));
        rows
    }
}

fn collect_jobs<C, U>(
    corpus: &Corpus,
    conversation_selector: &C,
    utterance_selector: &U,
) -> Vec<ForecastJob>
where
    C: Fn(&Conversation) -> bool,
    U: Fn(&Utterance) -> bool,
{
    let mut jobs = Vec::new();
    for conversation in corpus
        .iter_conversations()
        .filter(|c| conversation_selector(c))
    {
        let utterances: Vec<&Utterance> = corpus
            .utterances_of(conversation)
            .into_iter()
            .filter(|u| utterance_selector(u))
            .collect();
        for idx in 1..utterances.len() {
            jobs.push(ForecastJob {
                target_id: utterances[idx].id.clone(),
                context: utterances[..idx].iter().map(|u| u.text.clone()).collect(),
            });
        }
    }
    jobs
}

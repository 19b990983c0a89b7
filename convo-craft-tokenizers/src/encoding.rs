use candle_core::{Device, Tensor};
use convo_craft::Result;

/// A struct containing the padded encoding of several utterances.
#[derive(Debug)]
pub struct BatchEncoding {
    input_ids: Tensor,
    attention_mask: Tensor,
    lengths: Vec<usize>,
}

impl BatchEncoding {
    pub fn new(input_ids: Tensor, attention_mask: Tensor, lengths: Vec<usize>) -> Self {
        BatchEncoding {
            input_ids,
            attention_mask,
            lengths,
        }
    }

    pub fn get_input_ids(&self) -> &Tensor {
        &self.input_ids
    }

    pub fn get_attention_mask(&self) -> &Tensor {
        &self.attention_mask
    }

    /// True (unpadded) length of every row, EOS included.
    pub fn get_lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn to_device(&mut self, device: &Device) -> Result<()> {
        self.input_ids = self.input_ids.to_device(device)?;
        self.attention_mask = self.attention_mask.to_device(device)?;
        Ok(())
    }
}

/// A batch of dialogs flattened into one padded utterance batch.
///
/// Utterances stay grouped per dialog and in dialog order, so the rows of
/// dialog `i` start at `dialog_lengths[..i].sum()`.
#[derive(Debug)]
pub struct DialogEncoding {
    input_ids: Tensor,
    attention_mask: Tensor,
    utterance_lengths: Vec<usize>,
    dialog_lengths: Vec<usize>,
}

impl DialogEncoding {
    pub fn new(
        input_ids: Tensor,
        attention_mask: Tensor,
        utterance_lengths: Vec<usize>,
        dialog_lengths: Vec<usize>,
    ) -> Self {
        DialogEncoding {
            input_ids,
            attention_mask,
            utterance_lengths,
            dialog_lengths,
        }
    }

    pub fn get_input_ids(&self) -> &Tensor {
        &self.input_ids
    }

    pub fn get_attention_mask(&self) -> &Tensor {
        &self.attention_mask
    }

    pub fn get_utterance_lengths(&self) -> &[usize] {
        &self.utterance_lengths
    }

    pub fn get_dialog_lengths(&self) -> &[usize] {
        &self.dialog_lengths
    }

    pub fn to_device(&mut self, device: &Device) -> Result<()> {
        self.input_ids = self.input_ids.to_device(device)?;
        self.attention_mask = self.attention_mask.to_device(device)?;
        Ok(())
    }
}

//! Generation capability contract
//!
//! The loaded model is a black box behind this trait: one operation that
//! turns a normalized conversation plus sampling parameters into reply text.

use eyre::Result;

use crate::normalize::NormalizedMessage;

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    /// 0 means greedy decoding
    pub temperature: f64,
    /// Seeds a call-local sampler; identical inputs and seed reproduce the
    /// same output on the same loaded model
    pub seed: Option<u64>,
    pub max_tokens: usize,
}

/// A loaded chat model. Implementations own their tokenizer and weights and
/// block the calling thread for the duration of the generation.
pub trait ChatModel {
    fn generate(&mut self, messages: &[NormalizedMessage], params: &GenerationParams)
        -> Result<String>;
}

//! LLaVA generation backend
//!
//! Wraps candle-transformers' LLaVA model (llava-hf layout: safetensors
//! weights + `tokenizer.json`). Images arrive already decoded as RGB
//! buffers; they are resized and CLIP-normalized here, then spliced into the
//! token stream at their image slots by the model's multimodal projector.

use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::llama::{Cache, Config as LlamaConfig};
use candle_transformers::models::llava::config::{
    HFGenerationConfig, HFLLaVAConfig, HFPreProcessorConfig, LLaVAConfig,
};
use candle_transformers::models::llava::LLaVA;
use eyre::{Context, Result};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use image::imageops::FilterType;
use image::RgbImage;
use tokenizers::Tokenizer;

use crate::engines::device::LoadPolicy;
use crate::engines::model::{ChatModel, GenerationParams};
use crate::normalize::{NormalizedMessage, NormalizedPart};

/// CLIP-ViT-L/14-336 input resolution
const IMAGE_SIZE: usize = 336;
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Sampler seed when the request does not provide one
const DEFAULT_SEED: u64 = 299_792_458;

pub struct LlavaModel {
    model: LLaVA,
    tokenizer: Tokenizer,
    config: LLaVAConfig,
    llama_config: LlamaConfig,
    device: Device,
    dtype: DType,
}

impl LlavaModel {
    /// Load tokenizer and weights for `model_id` on the given device.
    pub fn load(model_id: &str, device: &Device, policy: LoadPolicy) -> Result<Self> {
        let files = locate_model_files(model_id)?;

        let hf_config: HFLLaVAConfig = serde_json::from_slice(&std::fs::read(&files.config)?)
            .wrap_err("failed to parse config.json")?;
        let generation_config: HFGenerationConfig =
            serde_json::from_slice(&std::fs::read(&files.generation_config)?)
                .wrap_err("failed to parse generation_config.json")?;
        let preprocessor_config: HFPreProcessorConfig =
            serde_json::from_slice(&std::fs::read(&files.preprocessor_config)?)
                .wrap_err("failed to parse preprocessor_config.json")?;

        let config = hf_config.to_llava_config(&generation_config, &preprocessor_config);
        let clip_config = hf_config.to_clip_vision_config();
        let llama_config = config.to_llama_config();

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| eyre::eyre!("failed to load tokenizer: {}", e))?;

        tracing::info!(
            "Loading LLaVA weights from {} file(s), dtype {:?}",
            files.weights.len(),
            policy.dtype
        );
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&files.weights, policy.dtype, device)?
        };
        let model = LLaVA::load(vb, &config, Some(clip_config))
            .map_err(|e| eyre::eyre!("failed to build model: {}", e))?;

        Ok(Self {
            model,
            tokenizer,
            config,
            llama_config,
            device: device.clone(),
            dtype: policy.dtype,
        })
    }

    /// Encode prompt chunks into one token sequence; each image slot becomes
    /// the image token. Special tokens (BOS) are added by the tokenizer on
    /// the first text chunk only.
    fn tokenize(&self, prompt: &[PromptChunk]) -> Result<Tensor> {
        let mut ids: Vec<i64> = Vec::new();
        let mut first = true;
        for chunk in prompt {
            match chunk {
                PromptChunk::Text(text) => {
                    let add_special = first;
                    first = false;
                    let encoding = self
                        .tokenizer
                        .encode(text.as_str(), add_special)
                        .map_err(|e| eyre::eyre!("tokenization failed: {}", e))?;
                    ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
                }
                PromptChunk::Image => ids.push(self.config.image_token_index as i64),
            }
        }
        let len = ids.len();
        Ok(Tensor::from_vec(ids, (1, len), &self.device)?)
    }

    /// Resize to the CLIP input resolution and normalize to NCHW float.
    fn image_to_tensor(&self, img: &RgbImage) -> Result<Tensor> {
        let resized = image::imageops::resize(
            img,
            IMAGE_SIZE as u32,
            IMAGE_SIZE as u32,
            FilterType::CatmullRom,
        );
        let mut data = vec![0f32; 3 * IMAGE_SIZE * IMAGE_SIZE];
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                data[c * IMAGE_SIZE * IMAGE_SIZE + y as usize * IMAGE_SIZE + x as usize] =
                    (pixel.0[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            }
        }
        let tensor = Tensor::from_vec(data, (1, 3, IMAGE_SIZE, IMAGE_SIZE), &self.device)?;
        Ok(tensor.to_dtype(self.dtype)?)
    }
}

impl ChatModel for LlavaModel {
    fn generate(
        &mut self,
        messages: &[NormalizedMessage],
        params: &GenerationParams,
    ) -> Result<String> {
        let prompt = render_prompt(messages);
        let images: Vec<&RgbImage> = messages
            .iter()
            .flat_map(|m| m.parts.iter())
            .filter_map(|p| match p {
                NormalizedPart::Image(img) => Some(img),
                NormalizedPart::Text(_) => None,
            })
            .collect();

        let input_ids = self.tokenize(&prompt)?;

        // Fresh KV cache per call; nothing survives across requests.
        let mut cache = Cache::new(true, self.dtype, &self.llama_config, &self.device)
            .map_err(|e| eyre::eyre!("failed to initialize KV cache: {}", e))?;

        let mut input_embeds = if images.is_empty() {
            self.model.llama.embed(&input_ids)?
        } else {
            let image_tensors = images
                .iter()
                .map(|img| self.image_to_tensor(img))
                .collect::<Result<Vec<_>>>()?;
            let image_sizes: Vec<(u32, u32)> =
                images.iter().map(|img| (img.width(), img.height())).collect();
            self.model
                .prepare_inputs_labels_for_multimodal(&input_ids, &image_tensors, &image_sizes)
                .map_err(|e| eyre::eyre!("image embedding failed: {}", e))?
        };

        // Call-local sampler: the seed never touches shared state, so
        // concurrent requests cannot interfere with each other's sampling.
        let sampling = if params.temperature <= 0.0 {
            Sampling::ArgMax
        } else {
            Sampling::All {
                temperature: params.temperature,
            }
        };
        let mut sampler =
            LogitsProcessor::from_sampling(params.seed.unwrap_or(DEFAULT_SEED), sampling);

        let mut generated: Vec<u32> = Vec::new();
        let mut index_pos = 0;
        for _ in 0..params.max_tokens {
            let (_, embeds_len, _) = input_embeds.dims3()?;
            let logits = self
                .model
                .forward(&input_embeds, index_pos, &mut cache)
                .map_err(|e| eyre::eyre!("generation failed: {}", e))?;
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            index_pos += embeds_len;

            let next_token = sampler.sample(&logits)?;
            if next_token as i64 == self.config.eos_token_id as i64 {
                break;
            }
            generated.push(next_token);

            let next_input = Tensor::from_vec(vec![next_token as i64], (1, 1), &self.device)?;
            input_embeds = self.model.llama.embed(&next_input)?;
        }

        self.tokenizer
            .decode(&generated, true)
            .map_err(|e| eyre::eyre!("decoding failed: {}", e))
    }
}

/// One piece of the rendered prompt: literal text, or a slot to be filled by
/// an image embedding.
#[derive(Debug, PartialEq)]
enum PromptChunk {
    Text(String),
    Image,
}

/// Render a normalized conversation into LLaVA (vicuna-style) prompt chunks.
///
/// Image slots are emitted per image part, preserving their position among
/// the text parts of the same message. Slots are never derived by scanning
/// text, so user text that happens to contain an `<image>` marker cannot
/// open a slot the model has no pixels for.
fn render_prompt(messages: &[NormalizedMessage]) -> Vec<PromptChunk> {
    let mut chunks = Vec::new();
    let mut text = String::new();
    for msg in messages {
        match msg.role.as_str() {
            "system" => {}
            "assistant" => text.push_str("ASSISTANT: "),
            _ => text.push_str("USER: "),
        }
        for (i, part) in msg.parts.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            match part {
                NormalizedPart::Text(t) => text.push_str(t),
                NormalizedPart::Image(_) => {
                    if !text.is_empty() {
                        chunks.push(PromptChunk::Text(std::mem::take(&mut text)));
                    }
                    chunks.push(PromptChunk::Image);
                }
            }
        }
        match msg.role.as_str() {
            "system" => text.push_str("\n\n"),
            "assistant" => text.push_str("</s>\n"),
            _ => text.push('\n'),
        }
    }
    text.push_str("ASSISTANT:");
    chunks.push(PromptChunk::Text(text));
    chunks
}

struct ModelFiles {
    config: PathBuf,
    generation_config: PathBuf,
    preprocessor_config: PathBuf,
    tokenizer: PathBuf,
    weights: Vec<PathBuf>,
}

/// Find model files locally (direct path, `~` expansion, hub caches) or
/// download them through the HuggingFace hub API.
fn locate_model_files(model_id: &str) -> Result<ModelFiles> {
    if let Some(dir) = resolve_local_dir(model_id) {
        tracing::info!("Using local model directory: {:?}", dir);
        return model_files_from_dir(&dir);
    }

    tracing::info!("Model not cached locally, fetching {} from the hub", model_id);
    let api = Api::new().wrap_err("failed to initialize hub client")?;
    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        "main".to_string(),
    ));

    let config = repo.get("config.json").wrap_err("config.json not found")?;
    let generation_config = repo
        .get("generation_config.json")
        .wrap_err("generation_config.json not found")?;
    let preprocessor_config = repo
        .get("preprocessor_config.json")
        .wrap_err("preprocessor_config.json not found")?;
    let tokenizer = repo
        .get("tokenizer.json")
        .wrap_err("tokenizer.json not found")?;

    let weights = match repo.get("model.safetensors.index.json") {
        Ok(index_path) => {
            let index: serde_json::Value = serde_json::from_slice(&std::fs::read(&index_path)?)
                .wrap_err("failed to parse safetensors index")?;
            let map = index["weight_map"]
                .as_object()
                .ok_or_else(|| eyre::eyre!("safetensors index has no weight_map"))?;
            let mut names: Vec<&str> = map.values().filter_map(|v| v.as_str()).collect();
            names.sort_unstable();
            names.dedup();
            names
                .into_iter()
                .map(|name| repo.get(name).wrap_err_with(|| format!("missing shard {}", name)))
                .collect::<Result<Vec<_>>>()?
        }
        Err(_) => vec![repo
            .get("model.safetensors")
            .wrap_err("no safetensors weights found")?],
    };

    Ok(ModelFiles {
        config,
        generation_config,
        preprocessor_config,
        tokenizer,
        weights,
    })
}

/// Resolve a model id to an already-present local directory, if any.
fn resolve_local_dir(model_id: &str) -> Option<PathBuf> {
    let direct = PathBuf::from(model_id);
    if direct.join("config.json").exists() {
        return Some(direct);
    }
    if model_id.starts_with("~/") {
        let expanded = PathBuf::from(crate::utils::expand_tilde(model_id));
        if expanded.join("config.json").exists() {
            return Some(expanded);
        }
    }
    crate::utils::resolve_from_hub_cache(model_id)
        .filter(|dir| dir.join("config.json").exists())
}

fn model_files_from_dir(dir: &Path) -> Result<ModelFiles> {
    let required = |name: &str| -> Result<PathBuf> {
        let path = dir.join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(eyre::eyre!("{} not found in {:?}", name, dir))
        }
    };

    let mut weights: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "safetensors"))
        .collect();
    weights.sort();
    if weights.is_empty() {
        return Err(eyre::eyre!("no safetensors weights found in {:?}", dir));
    }

    Ok(ModelFiles {
        config: required("config.json")?,
        generation_config: required("generation_config.json")?,
        preprocessor_config: required("preprocessor_config.json")?,
        tokenizer: required("tokenizer.json")?,
        weights,
    })
}

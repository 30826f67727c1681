//! English to Chinese translation of article titles.
//!
//! The remote service is optional. Without an endpoint and credential the
//! built-in dictionary is used, and with them every remote failure falls back
//! to the dictionary, so translation never blocks article production.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::TranslationConfig;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Translation service returned status {0}")]
    HttpStatus(u16),
    #[error("Translation service returned an unusable response")]
    MalformedResponse,
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

/// Domain terms and their translations. Replacements are written in their
/// canonical casing; Latin letters in them follow the casing of the match.
const DICTIONARY: &[(&str, &str)] = &[
    ("artificial general intelligence", "通用人工智能"),
    ("artificial intelligence", "人工智能"),
    ("ai", "人工智能"),
    ("agi", "通用人工智能"),
    ("machine learning", "机器学习"),
    ("deep learning", "深度学习"),
    ("reinforcement learning", "强化学习"),
    ("supervised learning", "监督学习"),
    ("unsupervised learning", "无监督学习"),
    ("self-supervised learning", "自监督学习"),
    ("transfer learning", "迁移学习"),
    ("federated learning", "联邦学习"),
    ("few-shot learning", "小样本学习"),
    ("zero-shot", "零样本"),
    ("neural network", "神经网络"),
    ("neural networks", "神经网络"),
    ("convolutional neural network", "卷积神经网络"),
    ("recurrent neural network", "循环神经网络"),
    ("natural language processing", "自然语言处理"),
    ("nlp", "自然语言处理"),
    ("computer vision", "计算机视觉"),
    ("speech recognition", "语音识别"),
    ("image recognition", "图像识别"),
    ("object detection", "目标检测"),
    ("large language model", "大语言模型"),
    ("large language models", "大语言模型"),
    ("language model", "语言模型"),
    ("language models", "语言模型"),
    ("llm", "大语言模型"),
    ("llms", "大语言模型"),
    ("foundation model", "基础模型"),
    ("generative ai", "生成式人工智能"),
    ("generative", "生成式"),
    ("multimodal", "多模态"),
    ("transformer", "Transformer架构"),
    ("transformers", "Transformer架构"),
    ("attention mechanism", "注意力机制"),
    ("diffusion model", "扩散模型"),
    ("stable diffusion", "Stable Diffusion图像生成"),
    ("gpt", "GPT模型"),
    ("chatgpt", "ChatGPT聊天机器人"),
    ("chatbot", "聊天机器人"),
    ("chatbots", "聊天机器人"),
    ("openai", "OpenAI公司"),
    ("robotics", "机器人技术"),
    ("robot", "机器人"),
    ("robots", "机器人"),
    ("autonomous driving", "自动驾驶"),
    ("self-driving", "自动驾驶"),
    ("autonomous", "自主"),
    ("automation", "自动化"),
    ("algorithm", "算法"),
    ("algorithms", "算法"),
    ("data science", "数据科学"),
    ("big data", "大数据"),
    ("dataset", "数据集"),
    ("datasets", "数据集"),
    ("training data", "训练数据"),
    ("cloud computing", "云计算"),
    ("edge computing", "边缘计算"),
    ("quantum computing", "量子计算"),
    ("semiconductor", "半导体"),
    ("chip", "芯片"),
    ("chips", "芯片"),
    ("gpu", "GPU图形处理器"),
    ("inference", "推理"),
    ("training", "训练"),
    ("fine-tuning", "微调"),
    ("benchmark", "基准测试"),
    ("benchmarks", "基准测试"),
    ("model", "模型"),
    ("models", "模型"),
    ("agent", "智能体"),
    ("agents", "智能体"),
    ("open source", "开源"),
    ("open-source", "开源"),
    ("research", "研究"),
    ("researchers", "研究人员"),
    ("study", "研究"),
    ("breakthrough", "突破"),
    ("startup", "初创公司"),
    ("startups", "初创公司"),
    ("funding", "融资"),
    ("investment", "投资"),
    ("regulation", "监管"),
    ("ethics", "伦理"),
    ("safety", "安全"),
    ("privacy", "隐私"),
    ("security", "安全"),
    ("healthcare", "医疗健康"),
    ("drug discovery", "药物发现"),
    ("climate", "气候"),
    ("education", "教育"),
    ("enterprise", "企业"),
    ("industry", "行业"),
    ("market", "市场"),
    ("launch", "发布"),
    ("launches", "发布"),
    ("announces", "宣布"),
    ("new", "新"),
    ("tool", "工具"),
    ("tools", "工具"),
    ("platform", "平台"),
    ("application", "应用"),
    ("applications", "应用"),
    ("data", "数据"),
];

/// Letter casing of a matched span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Upper,
    Lower,
    Capitalized,
    Mixed,
}

fn casing_of(span: &str) -> Casing {
    let letters: Vec<char> = span.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if letters.iter().all(|c| c.is_ascii_uppercase()) {
        return Casing::Upper;
    }
    if letters.iter().all(|c| c.is_ascii_lowercase()) {
        return Casing::Lower;
    }

    // Leading capital, lowercase inside words. Later words may start either way.
    let mut first = true;
    let mut word_start = true;
    for c in span.chars() {
        if c.is_ascii_alphabetic() {
            if (first && !c.is_ascii_uppercase()) || (!word_start && !c.is_ascii_lowercase()) {
                return Casing::Mixed;
            }
            first = false;
            word_start = false;
        } else {
            word_start = true;
        }
    }
    Casing::Capitalized
}

fn apply_casing(replacement: &str, casing: Casing) -> String {
    match casing {
        Casing::Upper => replacement.to_ascii_uppercase(),
        Casing::Lower => replacement.to_ascii_lowercase(),
        Casing::Capitalized => {
            let mut out = String::with_capacity(replacement.len());
            let mut word_start = true;
            for c in replacement.chars() {
                if c.is_ascii_alphabetic() {
                    out.push(if word_start {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    });
                    word_start = false;
                } else {
                    out.push(c);
                    word_start = !c.is_ascii_alphanumeric();
                }
            }
            out
        }
        Casing::Mixed => replacement.to_string(),
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Deterministic term substitution from the built-in dictionary.
pub struct DictionaryTranslator {
    /// Longest terms first so that phrases win over their parts
    entries: Vec<(&'static str, &'static str)>,
}

impl Default for DictionaryTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl DictionaryTranslator {
    pub fn new() -> Self {
        let mut entries = DICTIONARY.to_vec();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn translate_text(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 2);
        let mut pos = 0;

        while pos < text.len() {
            let at_boundary = !text[..pos].chars().next_back().is_some_and(is_word_char);

            let matched = at_boundary
                .then(|| self.match_at(text, pos))
                .flatten();

            match matched {
                Some((len, replacement)) => {
                    let span = &text[pos..pos + len];
                    out.push_str(&apply_casing(replacement, casing_of(span)));
                    pos += len;
                }
                None => {
                    let c = text[pos..].chars().next().unwrap_or(' ');
                    out.push(c);
                    pos += c.len_utf8();
                }
            }
        }

        out
    }

    fn match_at(&self, text: &str, pos: usize) -> Option<(usize, &'static str)> {
        let rest = text[pos..].as_bytes();
        self.entries.iter().find_map(|(term, replacement)| {
            let len = term.len();
            if rest.len() < len || !rest[..len].eq_ignore_ascii_case(term.as_bytes()) {
                return None;
            }
            let after_ok = !text[pos + len..].chars().next().is_some_and(is_word_char);
            after_ok.then_some((len, *replacement))
        })
    }
}

#[async_trait]
impl Translator for DictionaryTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        Ok(self.translate_text(text))
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: Option<String>,
}

/// Client for a JSON translation endpoint.
pub struct RemoteTranslator {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    source_lang: String,
    target_lang: String,
}

impl RemoteTranslator {
    pub fn new(config: &TranslationConfig, endpoint: String, api_key: SecretString) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint,
            api_key,
            source_lang: config.source_lang.clone(),
            target_lang: config.target_lang.clone(),
        }
    }
}

#[async_trait]
impl Translator for RemoteTranslator {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&TranslateRequest {
                q: text,
                source: &self.source_lang,
                target: &self.target_lang,
                format: "text",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslationError::HttpStatus(status.as_u16()));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|_| TranslationError::MalformedResponse)?;

        body.translated_text
            .filter(|t| !t.trim().is_empty())
            .ok_or(TranslationError::MalformedResponse)
    }
}

/// Uses the primary translator and falls back to the dictionary on any error.
pub struct FallbackTranslator<T> {
    primary: T,
    fallback: DictionaryTranslator,
}

impl<T: Translator> FallbackTranslator<T> {
    pub fn new(primary: T) -> Self {
        Self {
            primary,
            fallback: DictionaryTranslator::new(),
        }
    }
}

#[async_trait]
impl<T: Translator> Translator for FallbackTranslator<T> {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        match self.primary.translate(text).await {
            Ok(translated) => Ok(translated),
            Err(e) => {
                warn!("Remote translation failed, using dictionary: {}", e);
                Ok(self.fallback.translate_text(text))
            }
        }
    }
}

/// Pick the translator once: remote (with fallback) when both an endpoint and
/// a credential are available, the dictionary otherwise.
pub fn select_translator(
    config: &TranslationConfig,
    api_key: Option<SecretString>,
) -> Arc<dyn Translator> {
    match (config.endpoint.clone(), api_key) {
        (Some(endpoint), Some(key)) => {
            info!("Using remote translation at {}", endpoint);
            Arc::new(FallbackTranslator::new(RemoteTranslator::new(
                config, endpoint, key,
            )))
        }
        _ => {
            info!("Using built-in translation dictionary");
            Arc::new(DictionaryTranslator::new())
        }
    }
}

/// [`select_translator`] with the credential read from the environment.
pub fn translator_from_config(config: &TranslationConfig) -> Arc<dyn Translator> {
    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from);
    select_translator(config, api_key)
}

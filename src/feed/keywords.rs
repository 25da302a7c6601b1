/// Topic keywords an entry must mention (AI and ML news, English and Korean).
pub const DEFAULT_INCLUDE_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "gpt",
    "llm",
    "large language model",
    "chatgpt",
    "generative ai",
    "computer vision",
    "nlp",
    "natural language processing",
    "transformer",
    "openai",
    "anthropic",
    "claude",
    "gemini",
    "mistral",
    "인공지능",
    "머신러닝",
    "딥러닝",
    "신경망",
    "생성형 AI",
];

/// Noise keywords that veto an entry.
///
/// The bare `air` is intentionally broad: it also rejects "fair", "airline"
/// and "repair". It exists to keep Apple product coverage ("AirPods",
/// "MacBook Air") from slipping in via the `ai` substring.
pub const DEFAULT_EXCLUDE_KEYWORDS: &[&str] = &[
    "air",
    "airpods",
    "macbook air",
    "carplay",
    "android auto",
    "car display",
    "entertainment system",
    "stock",
    "price",
    "market",
    "shares",
    "trading",
    "investor",
    "주가",
    "주식",
    "시장",
    "투자",
];

/// Case-insensitive substring matcher over an include and an exclude list.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDE_KEYWORDS, DEFAULT_EXCLUDE_KEYWORDS)
    }
}

impl KeywordClassifier {
    /// Keywords are case-folded once here; blank keywords are dropped
    /// since an empty needle would match everything.
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            include: fold_all(include),
            exclude: fold_all(exclude),
        }
    }

    /// True iff any include keyword occurs in `text`.
    pub fn matches_topic(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.include.iter().any(|k| folded.contains(k.as_str()))
    }

    /// True iff any exclude keyword occurs in `text`.
    pub fn is_excluded(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.exclude.iter().any(|k| folded.contains(k.as_str()))
    }

    /// Acceptance rule: on-topic in title or description, and excluded in neither.
    pub fn accepts(&self, title: &str, description: &str) -> bool {
        (self.matches_topic(title) || self.matches_topic(description))
            && !(self.is_excluded(title) || self.is_excluded(description))
    }
}

fn fold_all<I>(keywords: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    keywords
        .into_iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

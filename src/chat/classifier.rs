//! Message classifier
//!
//! Decides per message whether the dataset must be attached and which model tier
//! answers. Pure rule union: any hit escalates to the capable tier with the dataset.

use regex::Regex;

/// Messages longer than this (in characters) always escalate
pub const LENGTH_THRESHOLD: usize = 100;

/// Terms that refer to the records themselves: counts, aggregation, data references
const DATASET_KEYWORDS: &[&str] = &[
    "件数", "何件", "合計", "平均", "最大", "最小", "集計", "一覧", "データ", "レコード",
    "テーブル", "項目", "ステータス", "担当者", "期限",
    "count", "total", "sum", "average", "records", "record", "data", "table", "list",
];

/// Terms that signal a question needing real analysis
const COMPLEXITY_KEYWORDS: &[&str] = &[
    "分析", "傾向", "比較", "特徴", "推移", "割合", "ランキング", "内訳",
    "analyze", "analyse", "analysis", "trend", "compare", "breakdown", "ratio",
];

const INTERROGATIVE_PATTERNS: &[&str] = &[
    r"何(件|個|人|名|社)",
    r"いくつ",
    r"いくら",
    r"どの(くらい|ぐらい|程度)",
    r"どれ(くらい|ぐらい|が|を)",
    r"誰が",
    r"(多い|少ない|高い|低い)の(は|を)",
    r"\bhow (many|much)\b",
    r"\bwhich\b.*\?",
    r"\bwho (has|is|owns)\b",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Cheap single-call model
    Simple,
    /// Capable model behind the analysis assistant
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    DatasetKeyword,
    InterrogativePattern,
    Length,
    ComplexityKeyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub requires_dataset: bool,
    pub tier: ModelTier,
    pub reason: Option<MatchReason>,
}

impl Classification {
    fn simple() -> Self {
        Self {
            requires_dataset: false,
            tier: ModelTier::Simple,
            reason: None,
        }
    }

    fn escalated(reason: MatchReason) -> Self {
        Self {
            requires_dataset: true,
            tier: ModelTier::Advanced,
            reason: Some(reason),
        }
    }
}

pub struct MessageClassifier {
    dataset_keywords: Vec<String>,
    complexity_keywords: Vec<String>,
    /// Pre-compiled, case-insensitive
    patterns: Vec<Regex>,
    length_threshold: usize,
}

impl MessageClassifier {
    pub fn new() -> Self {
        let patterns = INTERROGATIVE_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
            .collect();

        Self {
            dataset_keywords: DATASET_KEYWORDS.iter().map(|k| k.to_lowercase()).collect(),
            complexity_keywords: COMPLEXITY_KEYWORDS.iter().map(|k| k.to_lowercase()).collect(),
            patterns,
            length_threshold: LENGTH_THRESHOLD,
        }
    }

    pub fn classify(&self, message: &str) -> Classification {
        let lower = message.to_lowercase();

        if self.dataset_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return Classification::escalated(MatchReason::DatasetKeyword);
        }

        if self.patterns.iter().any(|re| re.is_match(message)) {
            return Classification::escalated(MatchReason::InterrogativePattern);
        }

        if message.chars().count() > self.length_threshold {
            return Classification::escalated(MatchReason::Length);
        }

        if self.complexity_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return Classification::escalated(MatchReason::ComplexityKeyword);
        }

        Classification::simple()
    }
}

impl Default for MessageClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(MessageClassifier::new().patterns.len(), INTERROGATIVE_PATTERNS.len());
    }

    #[test]
    fn test_dataset_keywords_escalate() {
        let classifier = MessageClassifier::new();
        for message in ["レコードの件数を教えて", "平均はいくつ", "Show me the DATA", "list everything"] {
            let result = classifier.classify(message);
            assert!(result.requires_dataset, "{message}");
            assert_eq!(result.tier, ModelTier::Advanced);
        }
        assert_eq!(
            classifier.classify("Total please").reason,
            Some(MatchReason::DatasetKeyword)
        );
    }

    #[test]
    fn test_interrogative_patterns_escalate() {
        let classifier = MessageClassifier::new();
        assert_eq!(
            classifier.classify("完了したタスクは何個ありますか").reason,
            Some(MatchReason::InterrogativePattern)
        );
        assert_eq!(
            classifier.classify("HOW MANY are open?").reason,
            Some(MatchReason::InterrogativePattern)
        );
        assert_eq!(
            classifier.classify("誰が一番多く担当していますか").tier,
            ModelTier::Advanced
        );
    }

    #[test]
    fn test_long_messages_escalate() {
        let classifier = MessageClassifier::new();
        let long = "あ".repeat(LENGTH_THRESHOLD + 1);
        assert_eq!(classifier.classify(&long).reason, Some(MatchReason::Length));

        // Character count, not byte length
        let at_limit = "あ".repeat(LENGTH_THRESHOLD);
        assert!(!classifier.classify(&at_limit).requires_dataset);
    }

    #[test]
    fn test_complexity_keywords_escalate() {
        let classifier = MessageClassifier::new();
        assert_eq!(
            classifier.classify("最近の傾向は").reason,
            Some(MatchReason::ComplexityKeyword)
        );
        assert_eq!(
            classifier.classify("Compare the two").reason,
            Some(MatchReason::ComplexityKeyword)
        );
    }

    #[test]
    fn test_plain_messages_stay_simple() {
        let classifier = MessageClassifier::new();
        for message in ["こんにちは", "プリザンターとは？", "ありがとう", "hello there", ""] {
            let result = classifier.classify(message);
            assert_eq!(result, Classification::simple(), "{message}");
        }
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = MessageClassifier::new();
        let message = "担当者ごとの内訳";
        assert_eq!(classifier.classify(message), classifier.classify(message));
    }
}

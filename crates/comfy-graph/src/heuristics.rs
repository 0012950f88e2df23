//! Text-prompt polarity classification.
//!
//! Text-encode nodes carry a single ambiguous text slot; whether it holds the
//! positive or the negative prompt is guessed from a deterministic ranking of
//! signals: node title substrings, then keyword matches against the text,
//! then a length fallback. This is best-effort and may misclassify; the
//! ranking, not correctness, is the contract.

use lazy_static::lazy_static;
use regex::RegexSet;
use serde::{Deserialize, Serialize};

/// Verdict of a polarity classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

/// Which signal decided the verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Title,
    Keywords,
    Length,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub polarity: Polarity,
    pub signal: Signal,
    pub confidence: f32,
}

/// Keywords that mark a prompt as quality-seeking (positive).
pub const DEFAULT_POSITIVE_KEYWORDS: &[&str] = &[
    "masterpiece",
    "best quality",
    "high quality",
    "highly detailed",
    "sharp focus",
    "photorealistic",
    "cinematic",
    "beautiful",
    "8k",
    "4k",
];

/// Keywords that mark a prompt as defect-listing (negative).
pub const DEFAULT_NEGATIVE_KEYWORDS: &[&str] = &[
    "blurry",
    "low quality",
    "worst quality",
    "poor quality",
    "lowres",
    "low resolution",
    "pixelated",
    "bad anatomy",
    "deformed",
    "disfigured",
    "distorted",
    "watermark",
    "signature",
    "jpeg artifacts",
    "ugly",
];

/// A polarity classifier over configurable keyword sets.
///
/// The keyword sets are plain data so tests can substitute fixtures; there is
/// no module-level state involved in classification.
#[derive(Clone, Debug)]
pub struct PromptClassifier {
    positive: RegexSet,
    negative: RegexSet,
}

impl Default for PromptClassifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

lazy_static! {
    static ref DEFAULT_CLASSIFIER: PromptClassifier =
        PromptClassifier::new(DEFAULT_POSITIVE_KEYWORDS, DEFAULT_NEGATIVE_KEYWORDS)
            .expect("default keyword sets compile");
}

impl PromptClassifier {
    /// Builds a classifier from keyword lists. Keywords are matched as
    /// case-insensitive whole words/phrases.
    pub fn new(positive: &[&str], negative: &[&str]) -> Result<Self, regex::Error> {
        Ok(Self {
            positive: keyword_set(positive)?,
            negative: keyword_set(negative)?,
        })
    }

    /// Classifies one text slot. Signals are consulted in a fixed order:
    ///
    /// 1. the node title, when it names a polarity outright;
    /// 2. keyword matches in the text, defect keywords first;
    /// 3. the length fallback: longer than 10 characters reads as positive.
    pub fn classify(&self, title: Option<&str>, text: &str) -> Classification {
        if let Some(title) = title {
            let title = title.to_lowercase();
            if title.contains("negative") {
                return Classification {
                    polarity: Polarity::Negative,
                    signal: Signal::Title,
                    confidence: 1.0,
                };
            }
            if title.contains("positive") {
                return Classification {
                    polarity: Polarity::Positive,
                    signal: Signal::Title,
                    confidence: 1.0,
                };
            }
        }
        if self.negative.is_match(text) {
            return Classification {
                polarity: Polarity::Negative,
                signal: Signal::Keywords,
                confidence: 0.8,
            };
        }
        if self.positive.is_match(text) {
            return Classification {
                polarity: Polarity::Positive,
                signal: Signal::Keywords,
                confidence: 0.8,
            };
        }
        Classification {
            polarity: if text.len() > 10 {
                Polarity::Positive
            } else {
                Polarity::Negative
            },
            signal: Signal::Length,
            confidence: 0.5,
        }
    }
}

fn keyword_set(keywords: &[&str]) -> Result<RegexSet, regex::Error> {
    RegexSet::new(
        keywords
            .iter()
            .map(|k| format!(r"(?i)\b{}\b", regex::escape(k))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_outranks_keywords() {
        let classifier = PromptClassifier::default();
        // The text screams positive, but the title says otherwise.
        let c = classifier.classify(Some("Negative Prompt"), "masterpiece, best quality");
        assert_eq!(c.polarity, Polarity::Negative);
        assert_eq!(c.signal, Signal::Title);
    }

    #[test]
    fn defect_keywords_classify_as_negative() {
        let classifier = PromptClassifier::default();
        let c = classifier.classify(None, "blurry, low quality");
        assert_eq!(c.polarity, Polarity::Negative);
        assert_eq!(c.signal, Signal::Keywords);
    }

    #[test]
    fn quality_keywords_classify_as_positive() {
        let classifier = PromptClassifier::default();
        let c = classifier.classify(None, "a portrait, best quality, sharp focus");
        assert_eq!(c.polarity, Polarity::Positive);
        assert_eq!(c.signal, Signal::Keywords);
    }

    #[test]
    fn length_fallback_when_no_signal_matches() {
        let classifier = PromptClassifier::default();
        let long = classifier.classify(None, "a cat sitting on a windowsill at dusk");
        assert_eq!(long.polarity, Polarity::Positive);
        assert_eq!(long.signal, Signal::Length);

        let short = classifier.classify(None, "a cat");
        assert_eq!(short.polarity, Polarity::Negative);
        assert_eq!(short.signal, Signal::Length);
    }

    #[test]
    fn substituted_keyword_sets_are_honored() {
        let classifier = PromptClassifier::new(&["gold"], &["lead"]).unwrap();
        assert_eq!(
            classifier.classify(None, "turn lead into something").polarity,
            Polarity::Negative
        );
        assert_eq!(
            classifier.classify(None, "pure gold").polarity,
            Polarity::Positive
        );
        // Default keywords mean nothing to a substituted classifier.
        assert_eq!(
            classifier.classify(None, "blurry painting").signal,
            Signal::Length
        );
    }

    #[test]
    fn keywords_match_case_insensitively_as_phrases() {
        let classifier = PromptClassifier::default();
        let c = classifier.classify(None, "BLURRY mess");
        assert_eq!(c.polarity, Polarity::Negative);
        // "quality" alone is not a defect keyword.
        let c = classifier.classify(None, "museum quality print of a landscape");
        assert_eq!(c.polarity, Polarity::Positive);
    }
}

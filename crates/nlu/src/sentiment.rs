//! Lexicon sentiment analyzer
//!
//! Counts positive and negative cue words, boosted by intensifiers. The
//! negative score feeds the strong-negative-sentiment escalation rule.

use async_trait::async_trait;

use contact_center_core::{Result, Sentiment, SentimentAnalyzer, SentimentLabel, SentimentScores};

const NEGATIVE_CUES: &[&str] = &[
    "화나", "화가", "짜증", "최악", "불만", "실망", "엉망", "답답", "열받", "불편", "별로",
    "싫어", "나쁘", "어이없", "황당", "angry", "terrible", "worst",
];

const POSITIVE_CUES: &[&str] = &[
    "감사", "고마", "좋아", "좋네", "만족", "훌륭", "최고", "친절", "편리", "thanks", "great",
];

const INTENSIFIERS: &[&str] = &["너무", "정말", "진짜", "완전", "아주", "!!"];

const CUE_WEIGHT: f32 = 0.4;
const INTENSIFIER_WEIGHT: f32 = 0.15;
const MAX_SCORE: f32 = 0.98;

fn count_hits(text: &str, cues: &[&str]) -> usize {
    cues.iter().filter(|cue| text.contains(*cue)).count()
}

/// Keyword lexicon sentiment analyzer
#[derive(Debug, Default, Clone)]
pub struct LexiconSentimentAnalyzer;

impl LexiconSentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Score `text` synchronously
    pub fn score(&self, text: &str) -> Sentiment {
        let lowered = text.to_lowercase();
        let negative_hits = count_hits(&lowered, NEGATIVE_CUES);
        let positive_hits = count_hits(&lowered, POSITIVE_CUES);

        if negative_hits == 0 && positive_hits == 0 {
            return Sentiment::neutral();
        }

        let boost = count_hits(&lowered, INTENSIFIERS) as f32 * INTENSIFIER_WEIGHT;
        let weigh = |hits: usize| {
            if hits == 0 {
                0.0
            } else {
                (hits as f32 * CUE_WEIGHT + boost).min(MAX_SCORE)
            }
        };

        let negative = weigh(negative_hits);
        let positive = weigh(positive_hits);
        let mixed = if negative > 0.0 && positive > 0.0 {
            negative.min(positive)
        } else {
            0.0
        };
        let neutral = (1.0 - negative.max(positive)).max(0.0);

        let scores = SentimentScores {
            positive,
            negative,
            neutral,
            mixed,
        };

        let (label, confidence) = [
            (SentimentLabel::Negative, negative),
            (SentimentLabel::Positive, positive),
            (SentimentLabel::Mixed, mixed),
            (SentimentLabel::Neutral, neutral),
        ]
        .into_iter()
        .fold((SentimentLabel::Neutral, f32::MIN), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

        Sentiment {
            label,
            confidence,
            scores,
        }
    }
}

#[async_trait]
impl SentimentAnalyzer for LexiconSentimentAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Sentiment> {
        Ok(self.score(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_text() {
        let s = LexiconSentimentAnalyzer::new().score("영업시간 알려주세요");
        assert_eq!(s.label, SentimentLabel::Neutral);
        assert_eq!(s.negative_confidence(), 0.0);
    }

    #[test]
    fn test_strong_negative_crosses_escalation_threshold() {
        let s = LexiconSentimentAnalyzer::new().score("너무 화나고 짜증나요");
        assert_eq!(s.label, SentimentLabel::Negative);
        assert!(s.negative_confidence() > 0.8);
    }

    #[test]
    fn test_mild_negative_stays_below_threshold() {
        let s = LexiconSentimentAnalyzer::new().score("조금 불편해요");
        assert!(s.negative_confidence() > 0.0);
        assert!(s.negative_confidence() < 0.8);
    }

    #[test]
    fn test_positive() {
        let s = LexiconSentimentAnalyzer::new().score("친절하게 도와주셔서 감사합니다");
        assert_eq!(s.label, SentimentLabel::Positive);
    }

    #[tokio::test]
    async fn test_trait_analyze() {
        let s = LexiconSentimentAnalyzer::new().analyze("정말 최악이고 실망했어요").await.unwrap();
        assert_eq!(s.label, SentimentLabel::Negative);
    }
}

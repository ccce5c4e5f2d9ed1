//! Risk Scorer
//!
//! Turns the three investment-preference answers into a score and a
//! discrete risk level.

use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};
use crate::model::RiskLevel;

pub const MIN_ANSWER: i64 = 1;
pub const MAX_ANSWER: i64 = 3;

/// Three validated questionnaire answers, each in 1..=3
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireAnswers {
    answers: [u8; 3],
}

impl QuestionnaireAnswers {
    pub fn new(answer1: i64, answer2: i64, answer3: i64) -> Result<Self> {
        let mut answers = [0u8; 3];
        for (index, (slot, value)) in answers.iter_mut().zip([answer1, answer2, answer3]).enumerate() {
            if !(MIN_ANSWER..=MAX_ANSWER).contains(&value) {
                return Err(AdvisorError::InvalidAnswerRange {
                    index: index + 1,
                    value,
                    min: MIN_ANSWER,
                    max: MAX_ANSWER,
                });
            }
            // in range, so the cast is lossless
            *slot = value as u8;
        }
        Ok(Self { answers })
    }

    pub fn answers(&self) -> [u8; 3] {
        self.answers
    }

    /// Sum of the answers, always in 3..=9
    pub fn sum(&self) -> u8 {
        self.answers.iter().sum()
    }
}

/// Outcome of scoring a questionnaire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub answers: QuestionnaireAnswers,
    pub score: u8,
    pub level: RiskLevel,
}

/// Stateless questionnaire scorer
#[derive(Clone, Copy, Debug, Default)]
pub struct RiskScorer;

impl RiskScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score three raw answers.
    pub fn score(&self, answer1: i64, answer2: i64, answer3: i64) -> Result<(u8, RiskLevel)> {
        let assessment = self.assess(QuestionnaireAnswers::new(answer1, answer2, answer3)?);
        Ok((assessment.score, assessment.level))
    }

    pub fn assess(&self, answers: QuestionnaireAnswers) -> RiskAssessment {
        let score = answers.sum();
        let level = match RiskLevel::from_score(score) {
            Some(level) => level,
            // unreachable: three answers in 1..=3 always sum to 3..=9
            None => RiskLevel::Medium,
        };
        tracing::debug!(score, %level, "scored questionnaire");
        RiskAssessment { answers, score, level }
    }
}

//! Property questionnaire
//!
//! Four fixed questions asked between the inquiry and the estimate. The
//! answers are folded into the context handed to the estimate provider.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::EstimationError;
use crate::Result;

pub const QUESTION_COUNT: u8 = 4;

const MIN_ANSWER_LEN: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Question {
    pub number: u8,
    pub title: &'static str,
    pub placeholder: &'static str,
    pub required: bool,
}

const QUESTIONS: [Question; QUESTION_COUNT as usize] = [
    Question {
        number: 1,
        title: "What's your goal with your property?",
        placeholder: "I want to become much more profitable and have healthy land where I can grow those things on it",
        required: true,
    },
    Question {
        number: 2,
        title: "What's currently on your property?",
        placeholder: "I currently have 6 hectares of cattle (around 40 cows) and the rest is mostly vacant",
        required: true,
    },
    Question {
        number: 3,
        title: "How much time and money are you willing to invest?",
        placeholder: "I don't have a lot of time but I'd be willing to hire someone to help me out",
        required: true,
    },
    Question {
        number: 4,
        title: "Almost ready! Anything you're really excited about? Or even not excited about?",
        placeholder: "I feel I'm really interested in shifting more focus to the property. And I think that I love how it's connected to local",
        required: false,
    },
];

/// Look up a question by its 1-based number
pub fn question(number: u8) -> Option<&'static Question> {
    QUESTIONS.iter().find(|q| q.number == number)
}

pub fn questions() -> &'static [Question] {
    &QUESTIONS
}

/// Validate and trim an answer for `number`
pub fn validate_answer(number: u8, response: &str) -> Result<String> {
    let q = question(number).ok_or_else(|| {
        EstimationError::Validation(format!(
            "Question {} does not exist (1-{})",
            number, QUESTION_COUNT
        ))
    })?;

    let response = response.trim();
    if response.is_empty() {
        if q.required {
            return Err(EstimationError::Validation(
                "This question requires a response.".to_string(),
            ));
        }
        return Ok(String::new());
    }
    if response.chars().count() < MIN_ANSWER_LEN {
        return Err(EstimationError::Validation(format!(
            "Response must be at least {} characters long.",
            MIN_ANSWER_LEN
        )));
    }
    Ok(response.to_string())
}

/// Completion percentage, capped at 100
pub fn progress_percentage(current_question: u8) -> u8 {
    let pct = u32::from(current_question) * 100 / u32::from(QUESTION_COUNT);
    pct.min(100) as u8
}

/// Free-text context plus the answers, in question order
pub fn build_user_context(user_context: Option<&str>, responses: &BTreeMap<u8, String>) -> String {
    let mut context = user_context.unwrap_or_default().to_string();

    if !responses.is_empty() {
        let lines: Vec<String> = responses
            .iter()
            .map(|(number, response)| format!("Q{}: {}", number, response))
            .collect();
        context.push_str("\n\nQuestionnaire Responses:\n");
        context.push_str(&lines.join("\n"));
    }

    context
}

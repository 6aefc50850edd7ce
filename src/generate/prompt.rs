//! Prompt construction for question generation.

use crate::model::{Complexity, FocusArea, GenerationSettings, QuestionKind};

/// Build the generation prompt for the given source content and settings.
///
/// The model is instructed to reply with a `{"questions": [...]}` object
/// matching the question wire format; the response parser tolerates a
/// fenced code block around it and a bare array.
pub fn build_prompt(content: &str, settings: &GenerationSettings) -> String {
    let kind_instruction = match settings.kind {
        QuestionKind::MultipleChoice => format!(
            "All questions must be multiple-choice with exactly {} answer alternatives \
             and a single correct one.",
            settings.alternatives
        ),
        QuestionKind::TrueFalse => {
            "All questions must be true/false statements.".to_string()
        }
        QuestionKind::Essay => {
            "All questions must be open essay questions with no fixed answer.".to_string()
        }
        QuestionKind::Mixed => format!(
            "Mix question types freely: multiple-choice (with {} alternatives), \
             true/false, and essay.",
            settings.alternatives
        ),
    };

    let focus_instruction = match settings.focus {
        FocusArea::General => "Cover the material broadly.",
        FocusArea::Concepts => "Focus on core concepts and definitions.",
        FocusArea::Details => "Focus on specific details, facts, and figures.",
        FocusArea::Application => "Focus on applying the material to new situations.",
    };

    let complexity_instruction = match settings.complexity {
        Complexity::Standard => "",
        Complexity::Complex => {
            "Prefer multi-step questions that combine more than one idea from the material. "
        }
        Complexity::Contextual => {
            "Frame each question inside a short realistic scenario built from the material. "
        }
    };

    let contextual_note = if settings.contextual {
        "Where possible, reference the concrete context given in the material rather than \
         generic textbook phrasing. "
    } else {
        ""
    };

    format!(
        "You are a quiz author. Generate exactly {count} quiz questions at {difficulty} \
difficulty from the study material below.

{kind_instruction}
{focus_instruction} {complexity_instruction}{contextual_note}

Respond with ONLY JSON of the form {{\"questions\": [...]}}, no prose. Each
array element must have:
- \"question\": the question text
- \"type\": one of \"multiple-choice\", \"true-false\", \"essay\"
- for multiple-choice: \"options\" (array of strings) and \"correctIndex\" (0-based index)
- for true-false: \"answer\" (boolean)
- \"explanation\": a short explanation of the correct answer

Study material:
---
{content}
---",
        count = settings.count,
        difficulty = settings.difficulty,
    )
}

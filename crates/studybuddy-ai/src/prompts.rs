//! Prompt templates for question drafting and answer generation.

use crate::llm_provider::Message;
use studybuddy_core::{Question, ScoredChunk};

/// System message for both question prompts
pub const QUESTION_SYSTEM_PROMPT: &str =
    "You are an expert at creating practice questions based on study material.";

/// System message for retrieval-augmented answers
pub const ANSWER_SYSTEM_PROMPT: &str =
    "You answer exam questions using only the study material you are given.";

/// Drafts questions from one chunk. `{text}` is replaced with the chunk.
pub const QUESTION_TEMPLATE: &str = r#"Your goal is to prepare a student for their exam.
You do this by asking questions about the text below:

------------
{text}
------------

Create questions that will prepare the student for their exam.
Focus on the MOST IMPORTANT and FUNDAMENTAL concepts that appear frequently throughout the document.
Prioritize topics that are mentioned multiple times or take up significant space in the material.

Write each question so that it makes complete sense on its own.
Do NOT include phrases like "according to the text", "as mentioned", "in the passage", or similar references.
The questions should sound like they come directly from an exam or quiz, not from a reading comprehension task.

Do not use markdown formatting. Write one numbered question per line in plain text.

QUESTIONS:
"#;

/// Revises a running question list with another chunk.
/// `{existing}` is the current numbered list, `{text}` the new chunk.
pub const REFINE_TEMPLATE: &str = r#"Your goal is to help a student prepare for an exam.

We have some existing questions:
{existing}

Now we have additional context from the document:
------------
{text}
------------

Your task:
- Update the existing questions to ensure that all important topics from the entire document are covered.
- Do NOT replace questions from previous chunks unless they are redundant.
- Only add or refine questions to improve coverage.
- Ensure the final set of questions reflects the full document, not just the most recent chunk.

Prioritize questions about:
- Topics that appear frequently throughout the document
- Fundamental concepts that are central to the subject
- Major themes that span multiple sections
- Core principles that students must understand

Do NOT include phrases like "according to the text", "as mentioned", or "based on the document".
Make the questions fully self-contained and natural, as if they appeared in an exam.

Do not use markdown formatting, bullet points, or any other formatting.
Return the complete updated list as numbered questions in plain text.

QUESTIONS:
"#;

/// Answers one question from retrieved context.
pub const ANSWER_TEMPLATE: &str = r#"Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say that you don't know, don't try to make up an answer.

{context}

Question: {question}
Helpful Answer:"#;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// Fill `{name}` slots in a single left-to-right pass. Inserted values are
/// never rescanned, so braces inside chunk or question text survive as-is.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let extra: usize = slots.iter().map(|(_, value)| value.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let hit = slots.iter().find_map(|(name, value)| {
            after
                .strip_prefix(name)?
                .strip_prefix('}')
                .map(|remainder| (*value, remainder))
        });
        match hit {
            Some((value, remainder)) => {
                out.push_str(value);
                rest = remainder;
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

pub fn question_messages(chunk_text: &str) -> Vec<Message> {
    vec![
        Message::system(QUESTION_SYSTEM_PROMPT),
        Message::user(fill(QUESTION_TEMPLATE, &[("text", chunk_text)])),
    ]
}

pub fn refine_messages(existing: &[Question], chunk_text: &str) -> Vec<Message> {
    let listed = existing
        .iter()
        .map(|q| q.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = fill(
        REFINE_TEMPLATE,
        &[("existing", listed.as_str()), ("text", chunk_text)],
    );

    vec![Message::system(QUESTION_SYSTEM_PROMPT), Message::user(prompt)]
}

/// Retrieved chunks are stuffed into the prompt best-first.
pub fn answer_messages(question: &Question, context: &[ScoredChunk]) -> Vec<Message> {
    let context_text = context
        .iter()
        .map(|c| c.chunk.text.trim())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    let prompt = fill(
        ANSWER_TEMPLATE,
        &[
            ("context", context_text.as_str()),
            ("question", question.text.as_str()),
        ],
    );

    vec![Message::system(ANSWER_SYSTEM_PROMPT), Message::user(prompt)]
}

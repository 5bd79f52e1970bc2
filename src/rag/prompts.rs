//! Prompt templates for the summarization and QA stages

/// Build the per-candidate summarization prompt
///
/// The completion model is asked for a machine-readable first line so the
/// relevance score can be parsed back out of plain text.
pub fn build_summary_prompt(content: &str, question: &str) -> String {
    format!(
        r#"You are summarizing a retrieved passage so it can be used to answer a question.

Passage:
{content}

Question: {question}

Instructions:
1. On the first line, output `SCORE: <number>` where <number> is between 0.0 and 1.0 and rates how relevant the passage is to the question
2. On the following lines, write a short summary of the passage focused on the question
3. Do not output anything before the SCORE line

SCORE:"#
    )
}

/// Build the final question answering prompt
pub fn build_qa_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are an expert assistant answering questions from retrieved documentation.

Context: The following summaries were retrieved and may be relevant to the question:

{context}

Question: {question}

Instructions:
1. Provide a helpful and accurate answer based on the context above
2. If the context doesn't contain relevant information, say so clearly
3. Be concise but informative

Answer:"#
    )
}

/// System message for the QA chat call
pub const QA_SYSTEM_PROMPT: &str =
    "You are a precise assistant that answers questions using only the provided context.";

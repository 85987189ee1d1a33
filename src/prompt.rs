//! Query expansion and grounded prompt assembly.

use std::fmt::Write as _;

/// Widen an underspecified query before it is embedded.
///
/// Deterministic: the same query always maps to the same text.
pub fn rewrite_query(query: &str) -> String {
    format!("definition explanation background of {}", query.trim())
}

/// Build a prompt that restricts the answer to the given passages.
///
/// Passages are numbered from 1 in the order given, which is the rerank
/// order when called from the pipeline.
///
/// ```
/// use ragrank::prompt::build_prompt;
///
/// let prompt = build_prompt("what is rust?", &["A language."]);
/// assert!(prompt.contains("[1] A language."));
/// assert!(prompt.ends_with("Question:\nwhat is rust?"));
/// ```
pub fn build_prompt<S: AsRef<str>>(query: &str, passages: &[S]) -> String {
    let mut context = String::new();
    for (i, passage) in passages.iter().enumerate() {
        if i > 0 {
            context.push_str("\n\n");
        }
        let _ = write!(context, "[{}] {}", i + 1, passage.as_ref());
    }

    format!(
        "You are a helpful assistant.\n\
         Answer the question using ONLY the context below.\n\
         Do NOT call tools.\n\
         Do NOT output actions, code, or API calls.\n\
         Answer in plain English.\n\
         If the answer cannot be derived from the context, \
         say \"I don't know\".\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question:\n\
         {}",
        query.trim()
    )
}

//! Prompt templates.

const EXPLAIN_TEMPLATE: &str = "Simplify the following Kubernetes error message delimited by triple dashes written in --- {language} --- language; --- {error} ---.
Provide the most possible solution in a step by step style in no more than 280 characters. Write the output in the following format:
Error: {Explain error here}
Solution: {Step by step solution here}";

/// Explanation prompt for the joined failure texts of one result.
pub fn explain_prompt(language: &str, error: &str) -> String {
    EXPLAIN_TEMPLATE
        .replacen("{language}", language, 1)
        .replacen("{error}", error, 1)
}

/// Follow-up question about a rendered report.
pub fn follow_up_prompt(context: &str, question: &str) -> String {
    format!("Given the context {} {}", context, question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_language_and_error() {
        let prompt = explain_prompt("spanish", "Service has no endpoints");
        assert!(prompt.contains("--- spanish --- language; --- Service has no endpoints ---"));
        assert!(prompt.ends_with("Solution: {Step by step solution here}"));
    }

    #[test]
    fn placeholders_inside_the_error_are_left_alone() {
        let prompt = explain_prompt("english", "bad value {language}");
        assert!(prompt.contains("--- bad value {language} ---"));
    }

    #[test]
    fn follow_up_carries_context_then_question() {
        let prompt = follow_up_prompt("0 shop/cart\n- Error: no endpoints", "how do I fix it?");
        assert_eq!(
            prompt,
            "Given the context 0 shop/cart\n- Error: no endpoints how do I fix it?"
        );
    }
}

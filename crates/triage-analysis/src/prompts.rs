//! Prompt construction
//!
//! Prompts are short and point the tool at instruction files under the
//! prompt directory; the files carry the output schema.

use std::path::Path;

/// Prompt file with summarization instructions
pub const ISSUE_SUMMARY_PROMPT_FILE: &str = "issue_summary_prompt.md";

/// Prompt file with root-cause instructions and the output schema
pub const ANALYSIS_PROMPT_FILE: &str = "analysis_prompt.md";

/// Stage A: summarize the thread the error was reported in
#[must_use]
pub fn issue_summary(error_text: &str, channel_id: &str, thread_id: &str, file: &Path) -> String {
    format!(
        "For the error report '{error_text}' in channel id '{channel_id}' and thread id \
         '{thread_id}', read the whole thread and generate an issue summary following the \
         instructions in {}.",
        file.display()
    )
}

/// Stage B: root-cause analysis of `error_text`
#[must_use]
pub fn root_cause(error_text: &str, file: &Path, custom_instruction: Option<&str>) -> String {
    let base = format!(
        "For the error message / issue report \u{300c}{error_text}\u{300d}, analyze it following \
         the instructions in {} and make sure the result strictly matches the required JSON \
         format.",
        file.display()
    );
    match custom_instruction {
        Some(extra) => format!("{base}\n\nAlso pay particular attention to these instructions:\n{extra}"),
        None => base,
    }
}

/// Self-repair: reformat a malformed analysis without redoing it
#[must_use]
pub fn repair(malformed: &str, file: &Path) -> String {
    format!(
        "For `{malformed}`, make sure the analysis result matches the format in {} and output \
         JSON that satisfies the requirements.",
        file.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_instruction_is_appended_verbatim() {
        let file = Path::new("prompts/analysis_prompt.md");
        let prompt = root_cause("NPE", file, Some("Focus on the payment module\n- only Java"));
        assert!(prompt.contains("prompts/analysis_prompt.md"));
        assert!(prompt.ends_with("Focus on the payment module\n- only Java"));

        assert!(!root_cause("NPE", file, None).contains("Also pay"));
    }

    #[test]
    fn summary_prompt_names_thread() {
        let prompt = issue_summary("boom", "C1", "1700.01", Path::new("p/s.md"));
        assert!(prompt.contains("'C1'"));
        assert!(prompt.contains("'1700.01'"));
        assert!(prompt.contains("p/s.md"));
    }

    #[test]
    fn repair_prompt_embeds_output() {
        let prompt = repair("half an answer", Path::new("p/a.md"));
        assert!(prompt.starts_with("For `half an answer`"));
    }
}

//! User input checks for the interactive session.

/// Inputs that end the session, compared case-insensitively after trimming.
pub const EXIT_COMMANDS: [&str; 4] = ["exit", "quit", "q", "esci"];

/// Minimum number of characters in a trimmed question.
pub const MIN_QUESTION_CHARS: usize = 2;

pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_COMMANDS.contains(&input.as_str())
}

/// A question is valid when it has at least [`MIN_QUESTION_CHARS`]
/// non-surrounding-whitespace characters.
pub fn validate_question(question: &str) -> bool {
    let cleaned = question.trim();
    if cleaned.is_empty() {
        tracing::debug!("empty question");
        return false;
    }
    let len = cleaned.chars().count();
    if len < MIN_QUESTION_CHARS {
        tracing::debug!(chars = len, "question too short");
        return false;
    }
    true
}

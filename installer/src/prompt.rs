//! Interactive confirmation capability.
//!
//! Acquisition and the command layer never assume "yes": every decision
//! point goes through a [`Prompter`]. Production code uses
//! [`TerminalPrompter`]; tests inject scripted answers.

use std::io::{BufRead, Write};

/// Errors raised while asking the user a question.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Reading the answer or writing the question failed.
    #[error("prompt I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// No further answers are available (closed input or exhausted script).
    #[error("no answer available for \"{question}\"")]
    NoAnswer {
        /// The question that went unanswered.
        question: String,
    },
}

/// Capability for yes/no and free-text questions.
pub trait Prompter {
    /// Ask a yes/no question. Only an explicit `y`/`yes` counts as yes.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the question cannot be asked or answered.
    fn confirm(&self, question: &str) -> Result<bool, PromptError>;

    /// Ask for a line of free text, returned without surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the question cannot be asked or answered.
    fn ask_text(&self, question: &str) -> Result<String, PromptError>;
}

/// Interpret a yes/no answer; anything but `y`/`yes` is a no.
///
/// # Examples
///
/// ```
/// use backdrop_installer::prompt::is_affirmative;
///
/// assert!(is_affirmative("Y"));
/// assert!(is_affirmative(" yes\n"));
/// assert!(!is_affirmative(""));
/// assert!(!is_affirmative("n"));
/// ```
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// [`Prompter`] reading answers from stdin and writing questions to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn read_line(question: &str) -> Result<String, PromptError> {
        let mut stderr = std::io::stderr();
        write!(stderr, "{question}")?;
        stderr.flush()?;

        let mut answer = String::new();
        let read = std::io::stdin().lock().read_line(&mut answer)?;
        if read == 0 {
            return Err(PromptError::NoAnswer {
                question: question.trim().to_owned(),
            });
        }
        Ok(answer)
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str) -> Result<bool, PromptError> {
        match Self::read_line(&format!("{question} [y/N] ")) {
            Ok(answer) => Ok(is_affirmative(&answer)),
            // Closed input is treated as declining.
            Err(PromptError::NoAnswer { .. }) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn ask_text(&self, question: &str) -> Result<String, PromptError> {
        Self::read_line(&format!("{question} ")).map(|answer| answer.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::upper("Y", true)]
    #[case::lower("y", true)]
    #[case::word("Yes", true)]
    #[case::padded("  y \n", true)]
    #[case::empty("", false)]
    #[case::no("n", false)]
    #[case::other("sure", false)]
    fn affirmative_answers(#[case] answer: &str, #[case] expected: bool) {
        assert_eq!(is_affirmative(answer), expected);
    }

    #[test]
    fn no_answer_names_the_question() {
        let err = PromptError::NoAnswer {
            question: "Retry?".to_owned(),
        };
        assert!(err.to_string().contains("Retry?"));
    }
}

//! Line-based terminal prompts.
//!
//! Questions go to stderr so that stdout only carries command output.

use async_trait::async_trait;
use nvl_core::{Choice, Chooser, PromptError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Asks the operator questions, one line per answer.
pub struct Terminal<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl Terminal {
    /// Read answers from standard input.
    pub fn stdin() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> Terminal<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Read answers from `input`.
    pub fn with_input(input: R) -> Self {
        Self {
            lines: Mutex::new(input.lines()),
        }
    }

    async fn read_line(&self) -> Result<String, PromptError> {
        let mut lines = self.lines.lock().await;
        match lines.next_line().await? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(PromptError::Cancelled),
        }
    }

    /// Ask for a value, repeating until one is given.
    pub async fn ask(&self, message: &str, default: Option<&str>) -> Result<String, PromptError> {
        loop {
            match default {
                Some(default) => eprint!("{} [{}]: ", message, default),
                None => eprint!("{}: ", message),
            }

            let answer = self.read_line().await?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            if let Some(default) = default {
                return Ok(default.to_string());
            }
        }
    }

    /// Ask for a value that may be left empty.
    pub async fn ask_optional(&self, message: &str) -> Result<Option<String>, PromptError> {
        eprint!("{}: ", message);
        let answer = self.read_line().await?;
        Ok((!answer.is_empty()).then_some(answer))
    }

    /// Ask a yes/no question.
    pub async fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            eprint!("{} [{}] ", message, hint);
            match self.read_line().await?.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => eprintln!("Please answer yes or no."),
            }
        }
    }
}

#[async_trait]
impl<R> Chooser for Terminal<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn choose(&self, message: &str, choices: &[Choice]) -> Result<String, PromptError> {
        if choices.is_empty() {
            return Err(PromptError::Cancelled);
        }

        loop {
            eprintln!("{}:", message);
            for (index, choice) in choices.iter().enumerate() {
                eprintln!("  {}) {} ({})", index + 1, choice.label, choice.value);
            }
            eprint!("Selection: ");

            let answer = self.read_line().await?;
            match parse_selection(&answer, choices) {
                Ok(value) => return Ok(value),
                Err(e) => eprintln!("{}", e),
            }
        }
    }
}

/// Map an answer to a choice value, by number (1-based) or by value.
pub fn parse_selection(input: &str, choices: &[Choice]) -> Result<String, PromptError> {
    let input = input.trim();

    if let Ok(number) = input.parse::<usize>() {
        if let Some(choice) = number.checked_sub(1).and_then(|i| choices.get(i)) {
            return Ok(choice.value.clone());
        }
    }

    choices
        .iter()
        .find(|choice| choice.value == input)
        .map(|choice| choice.value.clone())
        .ok_or_else(|| PromptError::InvalidSelection {
            input: input.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices() -> Vec<Choice> {
        vec![Choice::new("Alpha", "alpha"), Choice::new("Beta", "beta")]
    }

    #[test]
    fn test_parse_selection_by_number() {
        assert_eq!(parse_selection("2", &choices()).unwrap(), "beta");
        assert_eq!(parse_selection(" 1 ", &choices()).unwrap(), "alpha");
    }

    #[test]
    fn test_parse_selection_by_value() {
        assert_eq!(parse_selection("beta", &choices()).unwrap(), "beta");
    }

    #[test]
    fn test_parse_selection_rejects_unknown() {
        for input in ["0", "3", "gamma", ""] {
            assert!(matches!(
                parse_selection(input, &choices()),
                Err(PromptError::InvalidSelection { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_choose_retries_invalid_answers() {
        let terminal = Terminal::with_input(b"9\nnope\n2\n".as_slice());
        let picked = terminal.choose("Pick one", &choices()).await.unwrap();
        assert_eq!(picked, "beta");
    }

    #[tokio::test]
    async fn test_choose_without_input_is_cancelled() {
        let terminal = Terminal::with_input(b"".as_slice());
        let result = terminal.choose("Pick one", &choices()).await;
        assert!(matches!(result, Err(PromptError::Cancelled)));
    }

    #[tokio::test]
    async fn test_ask_uses_default_on_empty_answer() {
        let terminal = Terminal::with_input(b"\ncustom\n".as_slice());
        assert_eq!(terminal.ask("Id", Some("alpha")).await.unwrap(), "alpha");
        assert_eq!(terminal.ask("Name", None).await.unwrap(), "custom");
    }

    #[tokio::test]
    async fn test_ask_repeats_until_answered() {
        let terminal = Terminal::with_input(b"\n\nvalue\n".as_slice());
        assert_eq!(terminal.ask("Name", None).await.unwrap(), "value");
    }

    #[tokio::test]
    async fn test_confirm() {
        let terminal = Terminal::with_input(b"maybe\nyes\n\n".as_slice());
        assert!(terminal.confirm("Continue?", false).await.unwrap());
        assert!(!terminal.confirm("Continue?", false).await.unwrap());
    }
}

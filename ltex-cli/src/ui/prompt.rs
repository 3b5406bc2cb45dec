//! Interactive failure prompt.

use async_trait::async_trait;
use dialoguer::Select;
use tracing::warn;

use ltex_core::{AcquisitionError, FailureChoice, FailurePrompt, OFFLINE_INSTRUCTIONS_URL};

const CHOICES: [(&str, FailureChoice); 3] = [
    ("Try again", FailureChoice::Retry),
    ("Offline instructions", FailureChoice::OfflineInstructions),
    ("Exit", FailureChoice::Exit),
];

/// Asks on the terminal whether to retry after a failed attempt.
pub struct TerminalPrompt;

#[async_trait]
impl FailurePrompt for TerminalPrompt {
    async fn on_failure(&self, error: &AcquisitionError, attempt: u32) -> FailureChoice {
        let message = format!(
            "Could not download or start ltex-ls (attempt {}): {}",
            attempt, error
        );

        let choice = tokio::task::spawn_blocking(move || {
            let items: Vec<&str> = CHOICES.iter().map(|(label, _)| *label).collect();
            Select::new()
                .with_prompt(message)
                .items(&items)
                .default(0)
                .interact_opt()
        })
        .await;

        let choice = match choice {
            Ok(Ok(Some(index))) => CHOICES
                .get(index)
                .map(|(_, choice)| *choice)
                .unwrap_or(FailureChoice::Exit),
            Ok(Ok(None)) => FailureChoice::Exit,
            Ok(Err(e)) => {
                warn!("Could not read answer: {}", e);
                FailureChoice::Exit
            }
            Err(e) => {
                warn!("Prompt task failed: {}", e);
                FailureChoice::Exit
            }
        };

        if choice == FailureChoice::OfflineInstructions {
            open_offline_instructions();
        }
        choice
    }
}

fn open_offline_instructions() {
    eprintln!("Offline installation: {}", OFFLINE_INSTRUCTIONS_URL);
    if let Err(e) = webbrowser::open(OFFLINE_INSTRUCTIONS_URL) {
        warn!("Could not open browser: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choices_cover_every_answer() {
        let choices: Vec<FailureChoice> = CHOICES.iter().map(|(_, c)| *c).collect();
        assert_eq!(
            choices,
            vec![
                FailureChoice::Retry,
                FailureChoice::OfflineInstructions,
                FailureChoice::Exit
            ]
        );
        assert_eq!(CHOICES[0].0, "Try again");
    }
}

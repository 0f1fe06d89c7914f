//! Terminal prompts backed by `dialoguer`.
//!
//! dialoguer blocks on the terminal, so every question runs on the blocking
//! pool and is raced against the run's cancellation token. Ctrl-C inside a
//! prompt comes back from the terminal as an `Interrupted` I/O error and is
//! reported as [`Interrupted`], never as an answer.

use std::io;

use async_trait::async_trait;
use dialoguer::{Confirm, Input, Password};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::connect::error::Interrupted;

use super::traits::Prompt;

/// Map a dialoguer outcome to an answer.
///
/// Any failure other than an interrupt (no terminal, closed stdin) yields
/// `fallback`.
fn settle<T>(what: &str, result: dialoguer::Result<T>, fallback: T) -> Result<T, Interrupted> {
    match result {
        Ok(answer) => Ok(answer),
        Err(dialoguer::Error::IO(e)) if e.kind() == io::ErrorKind::Interrupted => {
            debug!("{} prompt interrupted", what);
            Err(Interrupted)
        }
        Err(e) => {
            warn!("{} prompt failed, using the default: {}", what, e);
            Ok(fallback)
        }
    }
}

/// Asks questions on the controlling terminal.
#[derive(Debug, Clone, Default)]
pub struct DialoguerPrompt {
    cancel: CancellationToken,
}

impl DialoguerPrompt {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    async fn interact<T, F>(&self, what: &str, fallback: T, ask: F) -> Result<T, Interrupted>
    where
        T: Send + 'static,
        F: FnOnce() -> dialoguer::Result<T> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted);
        }

        let task = tokio::task::spawn_blocking(ask);
        let joined = tokio::select! {
            biased;

            _ = self.cancel.cancelled() => return Err(Interrupted),
            joined = task => joined,
        };

        match joined {
            Ok(result) => {
                let answer = settle(what, result, fallback);
                if answer.is_err() {
                    self.cancel.cancel();
                }
                answer
            }
            Err(join_error) => {
                warn!("{} prompt task failed: {}", what, join_error);
                Ok(fallback)
            }
        }
    }
}

#[async_trait]
impl Prompt for DialoguerPrompt {
    async fn ask_yes_no(&self, question: &str, default: bool) -> Result<bool, Interrupted> {
        let question = question.to_string();
        self.interact("Confirm", default, move || {
            Confirm::new()
                .with_prompt(question)
                .default(default)
                .interact()
        })
        .await
    }

    async fn ask_text(
        &self,
        question: &str,
        default: Option<&str>,
    ) -> Result<String, Interrupted> {
        let question = question.to_string();
        let default = default.map(str::to_string);
        let fallback = default.clone().unwrap_or_default();
        self.interact("Input", fallback, move || {
            let mut input = Input::<String>::new().with_prompt(question);
            match default {
                Some(value) => input = input.default(value),
                None => input = input.allow_empty(true),
            }
            input.interact_text()
        })
        .await
    }

    async fn ask_password(&self, question: &str) -> Result<String, Interrupted> {
        let question = question.to_string();
        self.interact("Password", String::new(), move || {
            Password::new()
                .with_prompt(question)
                .allow_empty_password(true)
                .interact()
        })
        .await
    }
}

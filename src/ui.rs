//! Terminal output and user prompts.

use std::time::Duration;

use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::{LaunchkitError, Result};

/// Questions the workflows ask the user.
pub trait Prompter: Send + Sync {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Index of the chosen item.
    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize>;

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String>;
}

/// Interactive prompts via dialoguer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::new()
            .with_prompt(format!("  {} {}", style("?").cyan().bold(), prompt))
            .default(default)
            .interact()?)
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        Ok(Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?)
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        let mut input = Input::<String>::new().with_prompt(prompt);
        if let Some(d) = default {
            input = input.default(d.to_string());
        }
        Ok(input.interact_text()?)
    }
}

/// Non-interactive mode: every question takes its default.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultsPrompter;

impl Prompter for DefaultsPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        tracing::debug!("Auto-answering '{}' with {}", prompt, default);
        Ok(default)
    }

    fn select(&self, prompt: &str, _items: &[String], default: usize) -> Result<usize> {
        tracing::debug!("Auto-selecting option {} for '{}'", default, prompt);
        Ok(default)
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
        default.map(str::to_string).ok_or_else(|| {
            LaunchkitError::Config(format!("'{}' needs a value in non-interactive mode", prompt))
        })
    }
}

pub fn heading(text: &str) {
    println!();
    println!("{}", style(text).bold().cyan());
}

pub fn success(text: impl AsRef<str>) {
    println!("  {} {}", style("✓").green().bold(), text.as_ref());
}

pub fn warn(text: impl AsRef<str>) {
    println!("  {} {}", style("!").yellow().bold(), text.as_ref());
}

pub fn fail(text: impl AsRef<str>) {
    println!("  {} {}", style("✕").red().bold(), text.as_ref());
}

/// An actionable next step, e.g. a command to run.
pub fn hint(text: impl AsRef<str>) {
    println!("    {} {}", style("→").cyan(), style(text.as_ref()).dim());
}

/// Spinner for long-running subprocesses. Hidden when stdout is not a terminal.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = if console::Term::stdout().is_term() {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::with_template("  {spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
pub mod fake {
    //! Scripted [`Prompter`] for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct ScriptedPrompter {
        confirms: Mutex<VecDeque<bool>>,
        selects: Mutex<VecDeque<usize>>,
        inputs: Mutex<VecDeque<String>>,
        pub asked: Mutex<Vec<String>>,
    }

    impl ScriptedPrompter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn confirm_with(self, answer: bool) -> Self {
            self.confirms.lock().unwrap().push_back(answer);
            self
        }

        pub fn select_with(self, index: usize) -> Self {
            self.selects.lock().unwrap().push_back(index);
            self
        }

        pub fn input_with(self, value: &str) -> Self {
            self.inputs.lock().unwrap().push_back(value.to_string());
            self
        }

        pub fn asked(&self) -> Vec<String> {
            self.asked.lock().unwrap().clone()
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
            self.asked.lock().unwrap().push(prompt.to_string());
            Ok(self.confirms.lock().unwrap().pop_front().unwrap_or(default))
        }

        fn select(&self, prompt: &str, _items: &[String], default: usize) -> Result<usize> {
            self.asked.lock().unwrap().push(prompt.to_string());
            Ok(self.selects.lock().unwrap().pop_front().unwrap_or(default))
        }

        fn input(&self, prompt: &str, default: Option<&str>) -> Result<String> {
            self.asked.lock().unwrap().push(prompt.to_string());
            match self.inputs.lock().unwrap().pop_front() {
                Some(v) => Ok(v),
                None => DefaultsPrompter.input(prompt, default),
            }
        }
    }
}

// ABOUTME: Single-choice terminal prompts behind a trait so actions can be driven by tests
// ABOUTME: Cancellation (Esc, q or Ctrl+C) is an ordinary outcome rather than an error

use anyhow::{Context, Result};
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Chosen(usize),
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    pub default: Option<usize>,
    pub page_size: Option<usize>,
}

pub trait Selector {
    /// Options are shown in the given order. Callers must pass a non-empty list.
    fn select(&self, prompt: &str, options: &[String], opts: SelectOptions) -> Result<Selection>;
}

pub struct TerminalSelector {
    theme: ColorfulTheme,
}

impl TerminalSelector {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Selector for TerminalSelector {
    fn select(&self, prompt: &str, options: &[String], opts: SelectOptions) -> Result<Selection> {
        if options.is_empty() {
            tracing::warn!("prompt {:?} called with no options", prompt);
            return Ok(Selection::Cancelled);
        }

        let mut select = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(options)
            .default(opts.default.unwrap_or(0).min(options.len() - 1));
        if let Some(page_size) = opts.page_size {
            select = select.max_length(page_size);
        }

        match select.interact_opt() {
            Ok(Some(index)) => Ok(Selection::Chosen(index)),
            Ok(None) => Ok(Selection::Cancelled),
            Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => {
                Ok(Selection::Cancelled)
            }
            Err(e) => Err(e).context("Failed to read selection"),
        }
    }
}

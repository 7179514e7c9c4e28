//! User interaction operations (confirmation and credential prompts).

use anyhow::Result;
use dialoguer::{Input, Password};

use super::RealRuntime;

use std::io::{self, BufRead, Write};

/// Core, testable implementation that reads from any BufRead and writes to any Write.
pub(crate) fn confirm_with_io<R: BufRead, W: Write>(
    prompt: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;

    let response = line.trim().to_lowercase();
    Ok(response == "y" || response == "yes")
}

impl RealRuntime {
    pub(crate) fn confirm_impl(&self, prompt: &str) -> Result<bool> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        let mut stdin_lock = stdin.lock();
        confirm_with_io(prompt, &mut stdin_lock, &mut stdout)
    }

    pub(crate) fn prompt_input_impl(&self, prompt: &str, default: Option<String>) -> Result<String> {
        let mut input = Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true);
        if let Some(default) = default {
            input = input.default(default);
        }
        Ok(input.interact_text()?.trim().to_string())
    }

    pub(crate) fn prompt_password_impl(&self, prompt: &str) -> Result<String> {
        let password = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()?;
        Ok(password)
    }
}

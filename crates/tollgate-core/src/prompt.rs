use tracing::debug;

use crate::args::ParsedArgs;
use crate::error::PromptError;
use crate::param::{Parameter, PromptText};

const CONFIRM_TEXT: &str = "Please confirm: ";
const CONFIRM_ERROR: &str = "ERROR: input does not match its confirmation";

/// Source of interactive input.
pub trait Prompter {
    /// Show `text` and read one line, without its line terminator.
    fn read_line(&mut self, text: &str, no_echo: bool) -> Result<String, PromptError>;
}

/// `"db-name"` becomes `"Db-Name: "`.
pub fn default_prompt_text(name: &str) -> String {
    let mut text = String::with_capacity(name.len() + 2);
    let mut in_word = false;
    for c in name.chars() {
        if c.is_alphabetic() {
            if in_word {
                text.extend(c.to_lowercase());
            } else {
                text.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            text.push(c);
            in_word = false;
        }
    }
    text.push_str(": ");
    text
}

/// Ask for the value of `param`, repeating until it is non-empty unless
/// empty input is accepted, then confirm it if requested.
pub fn ask(prompter: &mut dyn Prompter, param: &Parameter) -> Result<String, PromptError> {
    let options = &param.prompt_options;
    let text = match &param.prompt {
        Some(PromptText::Custom(text)) => text.clone(),
        _ => default_prompt_text(&param.name),
    };

    let read = |prompter: &mut dyn Prompter, text: &str| -> Result<String, PromptError> {
        let line = prompter.read_line(text, options.no_echo)?;
        Ok(if options.strip {
            line.trim().to_string()
        } else {
            line
        })
    };

    let value = loop {
        let value = read(&mut *prompter, &text)?;
        if !value.is_empty() || options.accept_empty {
            break value;
        }
    };

    if let Some(confirm) = &options.confirm {
        let confirm_text = match confirm {
            PromptText::Custom(text) => text.as_str(),
            PromptText::Default => CONFIRM_TEXT,
        };
        if read(&mut *prompter, confirm_text)? != value {
            let message = options.confirm_error.as_deref().unwrap_or(CONFIRM_ERROR);
            return Err(PromptError::Mismatch(message.to_string()));
        }
    }

    Ok(value)
}

/// Prompt for every prompt-enabled parameter that has no value yet.
///
/// Returns `(name, value)` pairs in declaration order.
pub fn collect_missing(
    parameters: &[Parameter],
    args: &ParsedArgs,
    prompter: &mut dyn Prompter,
) -> Result<Vec<(String, String)>, PromptError> {
    let mut collected = Vec::new();
    for param in parameters {
        if param.prompt.is_none() {
            continue;
        }
        let missing = args.get(&param.key()).is_none_or(|value| value.is_null());
        if missing {
            debug!(parameter = %param.name, "prompting for missing value");
            collected.push((param.name.clone(), ask(prompter, param)?));
        }
    }
    Ok(collected)
}

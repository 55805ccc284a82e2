use codetracker_hooks::hooks::{self, user_prompt_submit};
use codetracker_hooks::types::UserPromptSubmitInput;

fn main() {
    hooks::execute::<UserPromptSubmitInput, _>("user-prompt-submit", user_prompt_submit::run)
}

use codetracker_hooks::hooks::{self, stop};
use codetracker_hooks::types::StopInput;

fn main() {
    hooks::execute::<StopInput, _>("stop", stop::run)
}

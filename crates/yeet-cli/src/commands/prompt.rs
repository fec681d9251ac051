//! System prompt commands.

use anyhow::Context;

use yeet_core::prompt::PromptStore;

use crate::term;
use crate::PromptAction;

pub fn handle(action: PromptAction) -> anyhow::Result<()> {
    let store = PromptStore::default_location()?;
    let p = term::palette();
    match action {
        PromptAction::Show => {
            println!("\n{}\n", store.load());
        }
        PromptAction::Edit => {
            // Creates the file with the default prompt if it is missing
            store.load();
            term::open_in_editor(store.path())?;
            println!("  {}✓{} Prompt saved.", p.green, p.reset);
        }
        PromptAction::Reset => {
            store.reset().context("failed to reset prompt")?;
            println!("  {}✓{} Prompt reset to default.", p.green, p.reset);
        }
    }
    Ok(())
}

use crate::render::CircuitSelector;
use dialoguer::Select;

/// Asks on the terminal which of several declared circuits to draw.
pub struct PromptSelector;

impl CircuitSelector for PromptSelector {
    fn select(&self, names: &[String]) -> Option<String> {
        let index = Select::new()
            .with_prompt("Several circuits are defined; which one should be drawn?")
            .items(names)
            .default(0)
            .interact_opt()
            .ok()
            .flatten()?;
        names.get(index).cloned()
    }
}

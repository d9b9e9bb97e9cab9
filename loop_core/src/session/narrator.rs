//! Narration sinks.

/// Receives plain text for the player.
pub trait Narrator {
    fn narrate(&mut self, text: &str);
}

impl Narrator for Vec<String> {
    fn narrate(&mut self, text: &str) {
        self.push(text.to_string());
    }
}

/// Discards everything. Handy when only the world state matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Narrator for Silent {
    fn narrate(&mut self, _text: &str) {}
}

//! Named sets of interchangeable lines.

use rand::seq::SliceRandom;
use rand::Rng;

/// A named, ordered collection of text lines. Any line may be picked when
/// the response is surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    name: String,
    lines: Vec<String>,
}

impl Response {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, text: &str) -> Self {
        self.add_line(text);
        self
    }

    pub fn add_line(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Pick a line uniformly at random. `None` only for a response with no
    /// lines.
    pub fn random_line<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        self.lines.choose(rng).map(String::as_str)
    }
}

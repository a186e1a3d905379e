use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub score: f32,
}

/// Passages returned by a similarity search, best match first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    passages: Vec<Passage>,
}

impl RetrievedContext {
    pub fn new(mut passages: Vec<Passage>) -> Self {
        passages.sort_by(|left, right| right.score.total_cmp(&left.score));
        Self { passages }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Joins non-blank passage texts with blank lines, or returns `fallback`
    /// when there is nothing to join.
    pub fn render_or(&self, fallback: &str) -> String {
        let texts = self
            .passages
            .iter()
            .map(|passage| passage.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>();
        if texts.is_empty() {
            return fallback.to_string();
        }
        texts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::{Passage, RetrievedContext};

    fn passage(text: &str, score: f32) -> Passage {
        Passage { text: text.to_string(), score }
    }

    #[test]
    fn orders_passages_by_descending_score() {
        let context = RetrievedContext::new(vec![
            passage("low", 0.2),
            passage("high", 0.9),
            passage("mid", 0.5),
        ]);

        let texts = context.passages().iter().map(|p| p.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["high", "mid", "low"]);
    }

    #[test]
    fn renders_fallback_when_empty() {
        assert_eq!(RetrievedContext::empty().render_or("No additional info."), "No additional info.");
    }

    #[test]
    fn renders_fallback_when_every_passage_is_blank() {
        let context = RetrievedContext::new(vec![passage("", 0.9), passage("  \n", 0.4)]);
        assert_eq!(context.render_or("No additional info."), "No additional info.");
    }

    #[test]
    fn skips_blank_passages_between_real_ones() {
        let context =
            RetrievedContext::new(vec![passage("a", 0.9), passage("", 0.5), passage("b", 0.1)]);
        assert_eq!(context.render_or("unused"), "a\n\nb");
    }

    #[test]
    fn renders_passages_separated_by_blank_lines() {
        let context = RetrievedContext::new(vec![passage("a", 0.9), passage("b", 0.1)]);
        assert_eq!(context.render_or("unused"), "a\n\nb");
    }
}

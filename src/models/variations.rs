use tracing::debug;

use super::message::ContentVariation;

/// Browse and regeneration state for one assistant reply slot.
///
/// Owns the ordered variation list, the currently selected index and the
/// streaming override used while a regeneration is in flight. The override
/// covers the window between "regenerate requested" and "regenerate
/// finished" so stale content never flashes back in between.
#[derive(Debug, Clone)]
pub struct VariationCycle {
    variations: Vec<ContentVariation>,
    index: usize,
    streaming: Option<String>,
}

impl VariationCycle {
    pub fn new(variations: Vec<ContentVariation>) -> Self {
        let index = variations.len().saturating_sub(1);
        Self {
            variations,
            index,
            streaming: None,
        }
    }

    /// The text to render: the streaming override when a regeneration is in
    /// flight, otherwise the selected variation.
    pub fn display(&self) -> &str {
        if let Some(streaming) = &self.streaming {
            return streaming;
        }
        self.variations
            .get(self.index)
            .map(|v| v.content.as_str())
            .unwrap_or_default()
    }

    pub fn variations(&self) -> &[ContentVariation] {
        &self.variations
    }

    pub fn len(&self) -> usize {
        self.variations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_regenerating(&self) -> bool {
        self.streaming.is_some()
    }

    /// Select the next variation, wrapping at the end.
    pub fn next(&mut self) {
        if self.variations.is_empty() {
            return;
        }
        self.index = (self.index + 1) % self.variations.len();
    }

    /// Select the previous variation, wrapping at the start.
    pub fn previous(&mut self) {
        if self.variations.is_empty() {
            return;
        }
        let len = self.variations.len();
        self.index = (self.index + len - 1) % len;
    }

    /// Mark a regeneration as started: the override replaces the selected
    /// variation on screen until the regeneration finishes or fails.
    pub fn begin_regenerate(&mut self) {
        self.streaming = Some(String::new());
    }

    /// Overwrite the override with the full accumulated text so far.
    pub fn update_streaming(&mut self, accumulated: String) {
        self.streaming = Some(accumulated);
    }

    /// Finish a regeneration: append the new variation, select it, then
    /// clear the override — in that order, so the newly generated text is
    /// what becomes visible.
    pub fn complete_regenerate(&mut self, final_text: String) {
        self.variations.push(ContentVariation::unsaved(final_text));
        self.index = self.variations.len() - 1;
        self.streaming = None;
    }

    /// Abandon an in-flight regeneration; the previously selected variation
    /// becomes visible again.
    pub fn cancel_regenerate(&mut self) {
        self.streaming = None;
    }

    /// Adopt the authoritative variation list after a server round-trip.
    /// Server state wins: the last entry is selected and any override is
    /// dropped.
    pub fn resync(&mut self, variations: Vec<ContentVariation>) {
        debug!(count = variations.len(), "resyncing variations from server");
        self.index = variations.len().saturating_sub(1);
        self.variations = variations;
        self.streaming = None;
    }
}

use std::collections::HashMap;

use feedscope_types::{Layer, LogEntry};

/// Layer and tag visibility toggles
///
/// Unknown layers and tags are visible. An entry without a tag is always
/// tag-visible.
#[derive(Clone, Debug, Default)]
pub struct VisibilityFilter {
    layers: HashMap<String, bool>,
    tags: HashMap<String, bool>,

    /// Bumped on every effective toggle change
    version: u64,
}

impl VisibilityFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a log entry passes both toggle sets
    pub fn is_visible(&self, entry: &LogEntry) -> bool {
        self.tag_visible(entry.tag.as_deref()) && self.layer_visible(&entry.layer)
    }

    pub fn layer_visible(&self, layer: &str) -> bool {
        self.layers.get(layer).copied().unwrap_or(true)
    }

    pub fn tag_visible(&self, tag: Option<&str>) -> bool {
        match tag {
            Some(tag) => self.tags.get(tag).copied().unwrap_or(true),
            None => true,
        }
    }

    pub fn set_layer(&mut self, layer: &str, visible: bool) {
        let before = self.layer_visible(layer);
        self.layers.insert(layer.to_string(), visible);
        if before != visible {
            self.version += 1;
        }
    }

    pub fn toggle_layer(&mut self, layer: &str) {
        let visible = self.layer_visible(layer);
        self.set_layer(layer, !visible);
    }

    /// Set every configured layer at once ("Everything" / "Nothing")
    pub fn set_all_layers(&mut self, layers: &[Layer], visible: bool) {
        for layer in layers {
            self.set_layer(&layer.name, visible);
        }
    }

    /// Whether every configured layer is on
    pub fn all_layers_on(&self, layers: &[Layer]) -> bool {
        layers.iter().all(|l| self.layer_visible(&l.name))
    }

    /// Whether every configured layer is off
    pub fn all_layers_off(&self, layers: &[Layer]) -> bool {
        !layers.is_empty() && layers.iter().all(|l| !self.layer_visible(&l.name))
    }

    pub fn set_tag(&mut self, tag: &str, visible: bool) {
        let before = self.tag_visible(Some(tag));
        self.tags.insert(tag.to_string(), visible);
        if before != visible {
            self.version += 1;
        }
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        let visible = self.tag_visible(Some(tag));
        self.set_tag(tag, !visible);
    }

    /// Register newly seen tags as visible, keeping existing toggles
    pub fn register_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self.tags.entry(tag.into()).or_insert(true);
        }
    }

    /// Tag toggles in name order
    pub fn tags(&self) -> Vec<(String, bool)> {
        let mut tags: Vec<_> = self.tags.iter().map(|(k, v)| (k.clone(), *v)).collect();
        tags.sort();
        tags
    }

    /// Forget all tag toggles
    pub fn clear_tags(&mut self) {
        if !self.tags.is_empty() {
            self.tags.clear();
            self.version += 1;
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

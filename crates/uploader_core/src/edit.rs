//! Pure helpers behind the archive edit commands: tag suggestions, plugin
//! results and the metadata draft they are merged into.

use crate::notification::Notification;

/// Minimum tag weight used when building suggestions.
pub const DEFAULT_SUGGESTION_MIN_WEIGHT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStat {
    pub namespace: String,
    pub text: String,
    pub weight: u64,
}

/// Completion labels for tag input: `namespace:text`, or bare `text`,
/// heaviest tags first.
pub fn tag_suggestions(stats: &[TagStat]) -> Vec<String> {
    let mut ranked: Vec<&TagStat> = stats.iter().collect();
    ranked.sort_by(|a, b| b.weight.cmp(&a.weight));
    ranked
        .into_iter()
        .map(|tag| {
            if tag.namespace.is_empty() {
                tag.text.clone()
            } else {
                format!("{}:{}", tag.namespace, tag.text)
            }
        })
        .collect()
}

/// Splits a plugin's `new_tags` string on commas, dropping at most one
/// whitespace character after each comma.
pub fn split_new_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',')
        .map(|tag| tag.strip_prefix(char::is_whitespace).unwrap_or(tag))
        .filter(|tag| !tag.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Parses a user-edited tag field ("a, b,c") into trimmed tags.
pub fn parse_tag_field(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Result of running a metadata plugin against an archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginResult {
    pub title: Option<String>,
    pub new_tags: String,
}

/// Title and tags as they will be saved for an archive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataDraft {
    pub title: String,
    pub tags: Vec<String>,
}

impl MetadataDraft {
    pub fn new(title: impl Into<String>, tags_field: &str) -> Self {
        Self {
            title: title.into(),
            tags: parse_tag_field(tags_field),
        }
    }

    /// Tag list in the form the metadata endpoint expects.
    pub fn tags_field(&self) -> String {
        self.tags.join(", ")
    }

    /// Adds tags not already present, keeping existing order. Returns the
    /// number of tags added.
    pub fn add_tags<I>(&mut self, tags: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.tags.len();
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self.tags.len() - before
    }

    /// Merges a plugin result into the draft and returns the notifications
    /// describing what changed.
    pub fn apply_plugin(&mut self, result: PluginResult) -> Vec<Notification> {
        let mut notifications = Vec::new();

        if let Some(title) = result.title.filter(|title| !title.is_empty()) {
            self.title = title.clone();
            notifications.push(Notification::info("Archive title changed to:", Some(title)));
        }

        if result.new_tags.is_empty() {
            notifications.push(Notification::info("No new tags added!", None));
        } else {
            self.add_tags(split_new_tags(&result.new_tags));
            notifications.push(Notification::info(
                "Added the following tags:",
                Some(result.new_tags),
            ));
        }

        notifications
    }
}

pub fn metadata_saved() -> Notification {
    Notification::success("Metadata saved!", None)
}

pub fn metadata_save_failed(message: impl Into<String>) -> Notification {
    Notification::error("Error while saving archive data:", message)
}

pub fn plugin_failed(message: impl Into<String>) -> Notification {
    Notification::error("Error while fetching tags:", message)
}

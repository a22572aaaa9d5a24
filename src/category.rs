use serde::{Deserialize, Serialize};
use std::fmt;

/// Content domain of a tip. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Frontend,
    Backend,
    Fullstack,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Frontend, Category::Backend, Category::Fullstack];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Frontend => "frontend",
            Category::Backend => "backend",
            Category::Fullstack => "fullstack",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "frontend" => Some(Category::Frontend),
            "backend" => Some(Category::Backend),
            "fullstack" => Some(Category::Fullstack),
            _ => None,
        }
    }

    /// Stable position of the category, used to index per-category tables.
    pub fn index(&self) -> usize {
        match self {
            Category::Frontend => 0,
            Category::Backend => 1,
            Category::Fullstack => 2,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Category::Frontend => "💡",
            Category::Backend => "🛠️",
            Category::Fullstack => "🌐",
        }
    }

    pub fn default_topics(&self) -> &'static [&'static str] {
        match self {
            Category::Frontend => &["CSS", "JavaScript", "React"],
            Category::Backend => &["Databases", "API", "Security"],
            Category::Fullstack => &["Integration", "Scalability", "Performance"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    #[default]
    Medium,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Medium => "medium",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Accepts the English labels and the Swedish ones older rows were stored with.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" | "nybörjare" => Some(Difficulty::Beginner),
            "medium" | "medel" => Some(Difficulty::Medium),
            "advanced" | "avancerad" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Illustrative tag list attached to every stored tip of a category.
///
/// Tags are static per category and never derived from the tip text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTags {
    tags: [Vec<String>; 3],
}

impl TopicTags {
    pub fn for_category(&self, category: Category) -> &[String] {
        &self.tags[category.index()]
    }

    pub fn set(&mut self, category: Category, tags: Vec<String>) {
        self.tags[category.index()] = tags;
    }

    /// Parses a comma-separated override, ignoring blank entries.
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(|tag| tag.to_string())
            .collect()
    }
}

impl Default for TopicTags {
    fn default() -> Self {
        let owned = |c: Category| c.default_topics().iter().map(|t| t.to_string()).collect();
        TopicTags {
            tags: [
                owned(Category::Frontend),
                owned(Category::Backend),
                owned(Category::Fullstack),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Some(category));
        }
        assert_eq!(Category::from_str("  FrontEnd "), Some(Category::Frontend));
        assert_eq!(Category::from_str("devops"), None);
    }

    #[test]
    fn test_category_indexes_are_distinct() {
        let mut indexes: Vec<_> = Category::ALL.iter().map(|c| c.index()).collect();
        indexes.sort();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_difficulty_accepts_legacy_labels() {
        assert_eq!(Difficulty::from_str("nybörjare"), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::from_str("MEDEL"), Some(Difficulty::Medium));
        assert_eq!(Difficulty::from_str("avancerad"), Some(Difficulty::Advanced));
        assert_eq!(Difficulty::from_str("expert"), None);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }

    #[test]
    fn test_topic_tags_override() {
        let mut tags = TopicTags::default();
        assert_eq!(tags.for_category(Category::Backend), &["Databases", "API", "Security"]);

        tags.set(Category::Backend, TopicTags::parse_list(" Rust, ,Tokio ,"));
        assert_eq!(tags.for_category(Category::Backend), &["Rust", "Tokio"]);
        assert_eq!(tags.for_category(Category::Frontend).len(), 3);
    }
}

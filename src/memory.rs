use crate::category::{Category, Difficulty};
use crate::database::{CategoryCount, Reflection, StoredTip};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const RECENT_TIPS_WINDOW: usize = 15;
pub const REFLECTIONS_WINDOW: usize = 10;

/// What the agent remembers about a posted tip.
#[derive(Debug, Clone, PartialEq)]
pub struct TipSummary {
    pub text: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub date: DateTime<Utc>,
}

impl From<&StoredTip> for TipSummary {
    fn from(tip: &StoredTip) -> Self {
        TipSummary {
            text: tip.text.clone(),
            category: tip.category,
            difficulty: tip.difficulty,
            date: tip.date,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryStat {
    pub count: u64,
    pub last_sent: Option<DateTime<Utc>>,
}

/// Per-category counters, one slot per [`Category`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryStats {
    slots: [CategoryStat; 3],
}

impl CategoryStats {
    pub fn get(&self, category: Category) -> CategoryStat {
        self.slots[category.index()]
    }

    pub fn record(&mut self, category: Category, at: DateTime<Utc>) {
        let slot = &mut self.slots[category.index()];
        slot.count += 1;
        slot.last_sent = Some(at);
    }

    pub fn from_counts(counts: &[CategoryCount]) -> Self {
        let mut stats = CategoryStats::default();
        for count in counts {
            stats.slots[count.category.index()] = CategoryStat {
                count: count.count,
                last_sent: count.last_sent,
            };
        }
        stats
    }
}

/// Process-local cache of recent history. Rebuilt from the store on startup,
/// then maintained as tips are generated.
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    recent_tips: VecDeque<TipSummary>,
    reflections: VecDeque<Reflection>,
    stats: CategoryStats,
}

impl AgentMemory {
    /// `tips` and `reflections` are expected newest first, as the store returns them.
    pub fn rebuild(tips: &[StoredTip], reflections: Vec<Reflection>, counts: &[CategoryCount]) -> Self {
        AgentMemory {
            recent_tips: tips.iter().take(RECENT_TIPS_WINDOW).map(TipSummary::from).collect(),
            reflections: reflections.into_iter().take(REFLECTIONS_WINDOW).collect(),
            stats: CategoryStats::from_counts(counts),
        }
    }

    pub fn record_tip(&mut self, tip: &StoredTip) {
        self.recent_tips.push_front(TipSummary::from(tip));
        self.recent_tips.truncate(RECENT_TIPS_WINDOW);
        self.stats.record(tip.category, tip.date);
    }

    pub fn record_reflection(&mut self, reflection: Reflection) {
        self.reflections.push_front(reflection);
        self.reflections.truncate(REFLECTIONS_WINDOW);
    }

    pub fn recent_tips(&self) -> impl Iterator<Item = &TipSummary> {
        self.recent_tips.iter()
    }

    pub fn tips_in(&self, category: Category, limit: usize) -> Vec<TipSummary> {
        self.recent_tips
            .iter()
            .filter(|t| t.category == category)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn reflections_in(&self, category: Category, limit: usize) -> Vec<Reflection> {
        self.reflections
            .iter()
            .filter(|r| r.category == category)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> &CategoryStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: i64, text: &str, category: Category) -> StoredTip {
        StoredTip {
            id,
            text: text.to_string(),
            category,
            difficulty: Difficulty::Medium,
            topics: Vec::new(),
            date: Utc::now(),
            verification_score: 0.0,
            feedback: Vec::new(),
        }
    }

    #[test]
    fn test_record_tip_prepends_and_bumps_stats() {
        let mut memory = AgentMemory::default();
        memory.record_tip(&stored(1, "old", Category::Backend));
        memory.record_tip(&stored(2, "new", Category::Backend));

        let texts: Vec<_> = memory.recent_tips().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["new", "old"]);
        assert_eq!(memory.stats().get(Category::Backend).count, 2);
        assert!(memory.stats().get(Category::Backend).last_sent.is_some());
        assert_eq!(memory.stats().get(Category::Frontend), CategoryStat::default());
    }

    #[test]
    fn test_recent_tips_window_is_bounded() {
        let mut memory = AgentMemory::default();
        for i in 0..(RECENT_TIPS_WINDOW as i64 + 5) {
            memory.record_tip(&stored(i, &format!("tip {}", i), Category::Frontend));
        }
        assert_eq!(memory.recent_tips().count(), RECENT_TIPS_WINDOW);
        assert_eq!(memory.recent_tips().next().unwrap().text, "tip 19");
        assert_eq!(memory.stats().get(Category::Frontend).count, 20);
    }

    #[test]
    fn test_tips_in_filters_by_category() {
        let tips = vec![
            stored(3, "c", Category::Frontend),
            stored(2, "b", Category::Backend),
            stored(1, "a", Category::Frontend),
        ];
        let memory = AgentMemory::rebuild(&tips, Vec::new(), &[]);

        let frontend = memory.tips_in(Category::Frontend, 5);
        assert_eq!(frontend.len(), 2);
        assert_eq!(frontend[0].text, "c");
        assert_eq!(memory.tips_in(Category::Fullstack, 5).len(), 0);
    }

    #[test]
    fn test_stats_from_counts() {
        let now = Utc::now();
        let stats = CategoryStats::from_counts(&[CategoryCount {
            category: Category::Fullstack,
            count: 7,
            last_sent: Some(now),
        }]);
        assert_eq!(stats.get(Category::Fullstack).count, 7);
        assert_eq!(stats.get(Category::Fullstack).last_sent, Some(now));
        assert_eq!(stats.get(Category::Backend).count, 0);
    }
}

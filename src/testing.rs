//! Stub collaborators shared by the unit tests.

use crate::category::Category;
use crate::database::{CategoryCount, Database, NewTip, Reflection, StoredTip, TipStore};
use crate::error::{TipError, TipResult};
use crate::llm::{GenerationOptions, TextGenerator};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Responder = Box<dyn Fn(usize, &str) -> TipResult<String> + Send + Sync>;

/// Generator whose answers come from a closure over (call number, prompt).
/// Call numbers start at 1.
pub struct ScriptedGenerator {
    respond: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    temperatures: Mutex<Vec<Option<f32>>>,
}

impl ScriptedGenerator {
    pub fn from_fn(respond: impl Fn(usize, &str) -> TipResult<String> + Send + Sync + 'static) -> Self {
        ScriptedGenerator {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            temperatures: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(text: &str) -> Self {
        let text = text.to_string();
        Self::from_fn(move |_, _| Ok(text.clone()))
    }

    /// Plays `answers` in order, then keeps repeating the last one.
    pub fn sequence(answers: &[&str]) -> Self {
        let answers: Vec<String> = answers.iter().map(|a| a.to_string()).collect();
        Self::from_fn(move |call, _| {
            let index = (call - 1).min(answers.len().saturating_sub(1));
            answers
                .get(index)
                .cloned()
                .ok_or_else(|| TipError::Generation("empty script".to_string()))
        })
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::from_fn(move |_, _| Err(TipError::Generation(message.clone())))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn temperatures(&self) -> Vec<Option<f32>> {
        self.temperatures.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> TipResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.temperatures.lock().unwrap().push(options.temperature);
        (self.respond)(call, prompt)
    }
}

/// Wraps the in-memory SQLite store and fails selected operations.
pub struct FlakyStore {
    pub inner: Database,
    pub fail_inserts: bool,
    pub fail_lookups: bool,
}

impl FlakyStore {
    pub async fn new() -> Self {
        FlakyStore {
            inner: memory_store().await,
            fail_inserts: false,
            fail_lookups: false,
        }
    }
}

#[async_trait]
impl TipStore for FlakyStore {
    async fn tip_exists(&self, text: &str, category: Category) -> TipResult<bool> {
        if self.fail_lookups {
            return Err(TipError::Persistence("lookup refused".to_string()));
        }
        self.inner.tip_exists(text, category).await
    }

    async fn insert_tip(&self, tip: &NewTip) -> TipResult<StoredTip> {
        if self.fail_inserts {
            return Err(TipError::Persistence("disk full".to_string()));
        }
        self.inner.insert_tip(tip).await
    }

    async fn recent_tips(&self, category: Option<Category>, limit: usize) -> TipResult<Vec<StoredTip>> {
        self.inner.recent_tips(category, limit).await
    }

    async fn insert_reflection(&self, reflection: &Reflection) -> TipResult<()> {
        self.inner.insert_reflection(reflection).await
    }

    async fn recent_reflections(&self, limit: usize) -> TipResult<Vec<Reflection>> {
        self.inner.recent_reflections(limit).await
    }

    async fn category_stats(&self) -> TipResult<Vec<CategoryCount>> {
        self.inner.category_stats().await
    }
}

pub async fn memory_store() -> Database {
    Database::new(":memory:").await.unwrap()
}

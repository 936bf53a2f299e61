use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::AppError;

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioTask {
    pub id: String,
    pub title: String,
    pub estimated_minutes: u32,
}

/// A problem-based-learning scenario as served by the catalogue routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub language: String,
    pub domains: Vec<String>,
    pub tasks: Vec<ScenarioTask>,
}

impl Scenario {
    pub fn estimated_minutes(&self) -> u32 {
        self.tasks.iter().map(|t| t.estimated_minutes).sum()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioFilter {
    pub language: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl ScenarioFilter {
    fn matches(&self, s: &Scenario) -> bool {
        self.language.as_deref().map_or(true, |l| s.language == l)
            && self.difficulty.map_or(true, |d| s.difficulty == d)
    }
}

// ─── Repository seam ─────────────────────────────────────────────

/// Read access to scenario content.
#[async_trait]
pub trait ScenarioRepository: Send + Sync {
    async fn list(&self, filter: &ScenarioFilter) -> Result<Vec<Scenario>, AppError>;

    async fn find(&self, id: &str) -> Result<Option<Scenario>, AppError>;

    async fn contains(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.find(id).await?.is_some())
    }
}

/// In-process repository, optionally slowed down to mimic a database
/// round-trip.
pub struct InMemoryScenarioRepository {
    scenarios: RwLock<BTreeMap<String, Scenario>>,
    latency: Duration,
}

impl InMemoryScenarioRepository {
    pub fn new(latency: Duration) -> Self {
        Self {
            scenarios: RwLock::new(BTreeMap::new()),
            latency,
        }
    }

    pub fn insert(&self, scenario: Scenario) {
        self.scenarios.write().insert(scenario.id.clone(), scenario);
    }

    pub fn len(&self) -> usize {
        self.scenarios.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ScenarioRepository for InMemoryScenarioRepository {
    async fn list(&self, filter: &ScenarioFilter) -> Result<Vec<Scenario>, AppError> {
        self.simulate_latency().await;
        Ok(self
            .scenarios
            .read()
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn find(&self, id: &str) -> Result<Option<Scenario>, AppError> {
        self.simulate_latency().await;
        Ok(self.scenarios.read().get(id).cloned())
    }

    async fn contains(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.scenarios.read().contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(id: &str, language: &str, difficulty: Difficulty) -> Scenario {
        Scenario {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            difficulty,
            language: language.into(),
            domains: vec![],
            tasks: vec![
                ScenarioTask { id: "t1".into(), title: "a".into(), estimated_minutes: 10 },
                ScenarioTask { id: "t2".into(), title: "b".into(), estimated_minutes: 25 },
            ],
        }
    }

    #[tokio::test]
    async fn filters_by_language_and_difficulty() {
        let repo = InMemoryScenarioRepository::new(Duration::ZERO);
        repo.insert(scenario("a", "en", Difficulty::Beginner));
        repo.insert(scenario("b", "zhTW", Difficulty::Beginner));
        repo.insert(scenario("c", "en", Difficulty::Advanced));

        let en = repo
            .list(&ScenarioFilter { language: Some("en".into()), difficulty: None })
            .await
            .unwrap();
        assert_eq!(en.len(), 2);

        let en_adv = repo
            .list(&ScenarioFilter {
                language: Some("en".into()),
                difficulty: Some(Difficulty::Advanced),
            })
            .await
            .unwrap();
        assert_eq!(en_adv.len(), 1);
        assert_eq!(en_adv[0].id, "c");
    }

    #[tokio::test]
    async fn find_and_contains() {
        let repo = InMemoryScenarioRepository::new(Duration::ZERO);
        repo.insert(scenario("a", "en", Difficulty::Beginner));
        assert!(repo.contains("a").await.unwrap());
        assert!(!repo.contains("zz").await.unwrap());
        assert_eq!(repo.find("a").await.unwrap().unwrap().estimated_minutes(), 35);
    }
}

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use crate::repository::{Difficulty, InMemoryScenarioRepository, Scenario, ScenarioTask};

// ─── Constants ───────────────────────────────────────────────────

const NUM_SCENARIOS: usize = 24;
const SEED: u64 = 42;

static LANGUAGES: &[&str] = &["en", "zhTW", "ja", "es"];

// ─── Content pools ───────────────────────────────────────────────

static TOPICS: &[&str] = &[
    "Smart Public Services",
    "AI-Assisted Job Search",
    "Sustainable City Planning",
    "Fact-Checking the News",
    "Designing a Study Plan",
    "Community Health Outreach",
    "Small Business Marketing",
    "Climate Data Storytelling",
];

static DOMAINS: &[&str] = &[
    "engaging_with_ai",
    "creating_with_ai",
    "managing_with_ai",
    "designing_with_ai",
];

static TASK_VERBS: &[&str] = &["Research", "Analyze", "Draft", "Review", "Present"];

/// Fill `repo` with a deterministic scenario catalogue.
pub fn seed(repo: &InMemoryScenarioRepository) {
    let mut rng = StdRng::seed_from_u64(SEED);

    for i in 0..NUM_SCENARIOS {
        let topic = TOPICS[i % TOPICS.len()];
        let language = LANGUAGES[(i / TOPICS.len()) % LANGUAGES.len()];
        let difficulty = match rng.gen_range(0u8..3) {
            0 => Difficulty::Beginner,
            1 => Difficulty::Intermediate,
            _ => Difficulty::Advanced,
        };

        let domain_count = rng.gen_range(1..=2usize);
        let start = rng.gen_range(0..DOMAINS.len());
        let domains = (0..domain_count)
            .map(|d| DOMAINS[(start + d) % DOMAINS.len()].to_string())
            .collect();

        let task_count = rng.gen_range(2..=TASK_VERBS.len());
        let tasks = TASK_VERBS[..task_count]
            .iter()
            .enumerate()
            .map(|(t, verb)| ScenarioTask {
                id: format!("task_{:02}", t + 1),
                title: format!("{verb}: {topic}"),
                estimated_minutes: rng.gen_range(5..=45),
            })
            .collect();

        repo.insert(Scenario {
            id: format!("scn_{:03}", i + 1),
            title: topic.to_string(),
            description: format!("Work through \"{topic}\" with an AI tutor."),
            difficulty,
            language: language.to_string(),
            domains,
            tasks,
        });
    }

    tracing::info!(scenarios = NUM_SCENARIOS, "seeded scenario catalogue");
}

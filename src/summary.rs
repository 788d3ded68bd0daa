use crate::types::Snapshot;
use std::collections::HashMap;

const TOP_TOPICS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageCount {
    pub name: String,
    pub count: usize,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotStats {
    pub total_repos: usize,
    pub total_stars: u64,
    pub total_forks: u64,
    pub avg_stars: u64,
    pub top_languages: Vec<LanguageCount>,
    pub top_topics: Vec<NameCount>,
    pub licenses: Vec<NameCount>,
}

fn ranked(counts: HashMap<String, usize>) -> Vec<NameCount> {
    let mut ranked: Vec<NameCount> = counts
        .into_iter()
        .map(|(name, count)| NameCount { name, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    ranked
}

pub fn summarize(snapshot: &Snapshot) -> SnapshotStats {
    let repos = &snapshot.repos;
    if repos.is_empty() {
        return SnapshotStats::default();
    }

    let total_stars: u64 = repos.iter().map(|r| r.stargazer_count).sum();
    let total_forks: u64 = repos.iter().map(|r| r.fork_count).sum();

    // The first color seen for a language wins.
    let mut languages: HashMap<String, (usize, Option<String>)> = HashMap::new();
    let mut topics: HashMap<String, usize> = HashMap::new();
    let mut licenses: HashMap<String, usize> = HashMap::new();

    for repo in repos {
        let (name, color) = match &repo.primary_language {
            Some(lang) => (lang.name.clone(), lang.color.clone()),
            None => ("Unknown".to_string(), None),
        };
        languages.entry(name).or_insert((0, color)).0 += 1;

        for topic in &repo.topics {
            *topics.entry(topic.clone()).or_insert(0) += 1;
        }

        let license = repo
            .license_info
            .as_ref()
            .map(|l| l.spdx_id.clone().unwrap_or_else(|| l.name.clone()))
            .unwrap_or_else(|| "No License".to_string());
        *licenses.entry(license).or_insert(0) += 1;
    }

    let mut top_languages: Vec<LanguageCount> = languages
        .into_iter()
        .map(|(name, (count, color))| LanguageCount { name, count, color })
        .collect();
    top_languages.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    let mut top_topics = ranked(topics);
    top_topics.truncate(TOP_TOPICS);

    SnapshotStats {
        total_repos: repos.len(),
        total_stars,
        total_forks,
        avg_stars: (total_stars as f64 / repos.len() as f64).round() as u64,
        top_languages,
        top_topics,
        licenses: ranked(licenses),
    }
}

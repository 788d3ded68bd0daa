use crate::snapshot;
use crate::summary::summarize;
use crate::AppError;
use std::path::Path;

pub fn summary_command(path: &Path) -> Result<(), AppError> {
    let snapshot = snapshot::read_snapshot(path)?;
    let stats = summarize(&snapshot);

    println!("Snapshot:  {}", path.display());
    println!("Generated: {}", snapshot.timestamp.to_rfc3339());
    println!();
    println!("  Repositories: {}", stats.total_repos);
    println!("  ⭐ Stars:      {} (avg {})", stats.total_stars, stats.avg_stars);
    println!("  Forks:        {}", stats.total_forks);

    if stats.total_repos == 0 {
        return Ok(());
    }

    println!("\nLanguages:");
    for lang in stats.top_languages.iter().take(10) {
        let color = lang.color.as_deref().unwrap_or("");
        println!("  {:<20} {:>6}  {}", lang.name, lang.count, color);
    }

    if !stats.top_topics.is_empty() {
        println!("\nTopics:");
        for topic in &stats.top_topics {
            println!("  #{:<19} {}", topic.name, topic.count);
        }
    }

    println!("\nLicenses:");
    for license in stats.licenses.iter().take(10) {
        println!("  {:<20} {}", license.name, license.count);
    }
    Ok(())
}

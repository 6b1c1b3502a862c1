//! Context formatter: turns the static profile into the system instruction.
//!
//! Everything here is pure: the same `(profile, message, history)` always
//! yields the same text. No ranking happens; a topic bucket either matches the
//! message or it does not, and every matched bucket is included in full.

use std::fmt::Write as _;

use serde::Serialize;

use crate::llm_client::prompts::{ASSISTANT_INSTRUCTIONS, NARRATIVE_FOOTER};
use crate::models::chat::HistoryEntry;
use crate::models::profile::Profile;

/// Topic buckets the contextual summary can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Experience,
    Projects,
    Skills,
    Education,
    Achievements,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Experience,
        Topic::Projects,
        Topic::Skills,
        Topic::Education,
        Topic::Achievements,
    ];

    fn keywords(self) -> &'static [&'static str] {
        match self {
            Topic::Experience => &[
                "experience", "work", "job", "career", "company", "role", "position",
            ],
            Topic::Projects => &["project", "built", "build", "portfolio", "app", "github"],
            Topic::Skills => &[
                "skill", "technolog", "tech", "language", "framework", "stack", "tool",
            ],
            Topic::Education => &[
                "education", "study", "studied", "university", "degree", "school", "college",
            ],
            Topic::Achievements => &[
                "achievement", "award", "hackathon", "won", "win", "prize", "certification",
            ],
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Topic::Experience => "Work experience in detail",
            Topic::Projects => "Projects in detail",
            Topic::Skills => "Technical skills",
            Topic::Education => "Education",
            Topic::Achievements => "Achievements and certifications",
        }
    }
}

/// Tags a message with every topic whose keywords it mentions.
pub fn matched_topics(message: &str) -> Vec<Topic> {
    let lower = message.to_lowercase();
    Topic::ALL
        .into_iter()
        .filter(|topic| topic.keywords().iter().any(|kw| lower.contains(kw)))
        .collect()
}

/// Full narrative of the profile. Always part of the system instruction.
pub fn format_profile_narrative(profile: &Profile) -> String {
    let p = &profile.profile;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are an AI assistant representing {}, a {}.\n",
        p.name, p.title
    );
    out.push_str("PROFILE:\n");
    let _ = writeln!(out, "- Name: {}", p.name);
    let _ = writeln!(out, "- Title: {}", p.title);
    let _ = writeln!(out, "- Location: {}", p.location);
    let _ = writeln!(out, "- Bio: {}", p.bio);
    let _ = writeln!(out, "- Contact: {} | {}", p.email, p.phone);
    let _ = writeln!(out, "- GitHub: {}", p.github_url);
    let _ = writeln!(out, "- LinkedIn: {}", p.linkedin_url);

    out.push_str("\nEXPERIENCE:\n");
    for exp in &profile.experiences {
        let _ = writeln!(
            out,
            "- {} at {} ({}){}",
            exp.role,
            exp.company,
            exp.period,
            if exp.current { " (Current)" } else { "" }
        );
        if !exp.location.is_empty() {
            let _ = writeln!(out, "  Location: {}", exp.location);
        }
        out.push_str("  Key Highlights:\n");
        for highlight in &exp.highlights {
            let _ = writeln!(out, "  • {highlight}");
        }
        let _ = writeln!(out, "  Technologies: {}", exp.technologies.join(", "));
    }

    out.push_str("\nPROJECTS:\n");
    for project in &profile.projects {
        let _ = writeln!(
            out,
            "- {}{}",
            project.name,
            if project.featured { " (Featured)" } else { "" }
        );
        let _ = writeln!(out, "  {}", project.description);
        let _ = writeln!(out, "  Tech Stack: {}", project.tech_stack.join(", "));
        if !project.highlights.is_empty() {
            out.push_str("  Key Highlights:\n");
            for highlight in &project.highlights {
                let _ = writeln!(out, "  • {highlight}");
            }
        }
        if let Some(url) = &project.github_url {
            let _ = writeln!(out, "  GitHub: {url}");
        }
        if let Some(url) = &project.live_url {
            let _ = writeln!(out, "  Live URL: {url}");
        }
    }

    out.push_str("\nSKILLS:\n");
    for skill in &profile.skills {
        let _ = writeln!(out, "- {}: {}", skill.category, skill.items.join(", "));
    }

    out.push_str("\nACHIEVEMENTS:\n");
    for achievement in &profile.achievements {
        let _ = writeln!(out, "- {} ({})", achievement.title, achievement.date);
        let _ = writeln!(out, "  Organization: {}", achievement.organization);
        let _ = writeln!(out, "  {}", achievement.description);
        let _ = writeln!(out, "  Category: {}", achievement.category);
    }

    out.push_str("\nEDUCATION:\n");
    for edu in &profile.education {
        let _ = writeln!(out, "- {} in {}", edu.degree, edu.field);
        let _ = writeln!(out, "  {}, {}", edu.institution, edu.location);
        let _ = writeln!(
            out,
            "  Period: {}{}",
            edu.period,
            if edu.current { " (Current)" } else { "" }
        );
    }

    out.push('\n');
    out.push_str(NARRATIVE_FOOTER);
    out
}

/// Focused rendering of the buckets the message touches, or `None` if none match.
///
/// Overlap with the narrative is intentional and not deduplicated.
pub fn contextual_summary(profile: &Profile, message: &str) -> Option<String> {
    let topics = matched_topics(message);
    if topics.is_empty() {
        return None;
    }

    let mut out = String::from("RELEVANT CONTEXT FOR THIS QUESTION:\n");
    for topic in topics {
        let _ = writeln!(out, "\n{}:", topic.heading());
        match topic {
            Topic::Experience => {
                for exp in &profile.experiences {
                    let _ = writeln!(
                        out,
                        "- {} at {} ({}): {}",
                        exp.role,
                        exp.company,
                        exp.period,
                        exp.highlights.join("; ")
                    );
                }
            }
            Topic::Projects => {
                for project in &profile.projects {
                    let _ = writeln!(
                        out,
                        "- {}: {} [{}]",
                        project.name,
                        project.description,
                        project.tech_stack.join(", ")
                    );
                }
            }
            Topic::Skills => {
                for skill in &profile.skills {
                    let _ = writeln!(out, "- {}: {}", skill.category, skill.items.join(", "));
                }
            }
            Topic::Education => {
                for edu in &profile.education {
                    let _ = writeln!(
                        out,
                        "- {} in {} at {} ({})",
                        edu.degree, edu.field, edu.institution, edu.period
                    );
                }
            }
            Topic::Achievements => {
                for achievement in &profile.achievements {
                    let _ = writeln!(
                        out,
                        "- {} from {} ({}): {}",
                        achievement.title,
                        achievement.organization,
                        achievement.date,
                        achievement.description
                    );
                }
            }
        }
    }
    Some(out.trim_end().to_string())
}

/// Renders prior turns oldest first.
pub fn format_history(history: &[HistoryEntry]) -> String {
    let mut out = String::from("CONVERSATION SO FAR:\n");
    for entry in history {
        let speaker = if entry.is_user { "User" } else { "Assistant" };
        let _ = writeln!(out, "{speaker}: {}", entry.message);
    }
    out.trim_end().to_string()
}

#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    /// Most recent turns considered at all.
    pub history_turns: usize,
    /// Maximum characters of the assembled instruction.
    pub budget_chars: usize,
}

/// The assembled system instruction plus what went into it.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub system: String,
    pub topics: Vec<Topic>,
    pub summary_included: bool,
    pub history_included: usize,
    pub history_dropped: usize,
}

/// Builds the system instruction for one chat request.
///
/// Under budget pressure, oldest history turns go first, then the contextual
/// summary. The profile narrative is never dropped, even if it alone exceeds
/// the budget.
pub fn build_system_instruction(
    profile: &Profile,
    message: &str,
    history: &[HistoryEntry],
    limits: ContextLimits,
) -> AssembledContext {
    let narrative = format_profile_narrative(profile);
    let mut summary = contextual_summary(profile, message);
    let topics = matched_topics(message);

    let recent_start = history.len().saturating_sub(limits.history_turns);
    let recent = &history[recent_start..];
    let mut skip = 0;

    let assemble = |summary: Option<&String>, turns: &[HistoryEntry]| {
        let mut parts: Vec<String> = vec![narrative.clone()];
        if let Some(summary) = summary {
            parts.push(summary.clone());
        }
        if !turns.is_empty() {
            parts.push(format_history(turns));
        }
        parts.push(ASSISTANT_INSTRUCTIONS.to_string());
        parts.join("\n\n")
    };

    let mut system = assemble(summary.as_ref(), &recent[skip..]);
    while system.chars().count() > limits.budget_chars && skip < recent.len() {
        skip += 1;
        system = assemble(summary.as_ref(), &recent[skip..]);
    }
    if system.chars().count() > limits.budget_chars && summary.is_some() {
        summary = None;
        system = assemble(None, &recent[skip..]);
    }

    AssembledContext {
        system,
        topics,
        summary_included: summary.is_some(),
        history_included: recent.len() - skip,
        history_dropped: recent_start + skip,
    }
}

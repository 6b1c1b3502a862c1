//! Suggested questions shown next to the chat input.

use crate::models::chat::HistoryEntry;
use crate::models::profile::Profile;

const MAX_SUGGESTIONS: usize = 4;
/// Recent user turns inspected when picking follow-ups.
const RECENT_USER_TURNS: usize = 5;

const AI_MARKERS: &[&str] = &["ai", "llm", "langchain", "openai"];

fn mentions_ai(text: &str) -> bool {
    let lower = text.to_lowercase();
    AI_MARKERS.iter().any(|m| {
        lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == *m)
    })
}

/// Opening questions built from the profile itself.
pub fn starter_questions(profile: &Profile) -> Vec<String> {
    let name = &profile.profile.name;
    let mut questions = vec![
        format!("Tell me about {name}"),
        format!("What is {name}'s background?"),
    ];

    if let Some(exp) = profile.current_experience() {
        questions.push(format!("What does {name} do at {}?", exp.company));
    } else if let Some(exp) = profile.experiences.first() {
        questions.push(format!("Tell me about the work at {}", exp.company));
    }

    let highlighted = profile
        .projects
        .iter()
        .find(|p| p.featured)
        .or_else(|| profile.projects.first());
    if let Some(project) = highlighted {
        questions.push(format!("Tell me about the {} project", project.name));
    }

    let has_ai_projects = profile
        .projects
        .iter()
        .any(|p| mentions_ai(&p.description) || p.tech_stack.iter().any(|t| mentions_ai(t)));
    if !profile.projects.is_empty() {
        questions.push(if has_ai_projects {
            "What AI projects have you built?".to_string()
        } else {
            "What interesting projects have you built?".to_string()
        });
    }

    if let Some(hackathon) = profile
        .achievements
        .iter()
        .find(|a| a.category.to_lowercase().contains("hackathon"))
    {
        questions.push(format!("Tell me about winning {}", hackathon.title));
    } else if !profile.achievements.is_empty() {
        questions.push("What are some notable achievements?".to_string());
    }

    if let Some(edu) = profile.education.iter().find(|e| e.current) {
        questions.push(format!("Tell me about studying {}", edu.field));
    } else if !profile.education.is_empty() {
        questions.push("What's the educational background?".to_string());
    }

    questions.truncate(MAX_SUGGESTIONS);
    questions
}

/// Follow-ups on topics the user has not asked about recently.
pub fn follow_up_questions(profile: &Profile, history: &[HistoryEntry]) -> Vec<String> {
    let recent: Vec<String> = history
        .iter()
        .filter(|h| h.is_user)
        .rev()
        .take(RECENT_USER_TURNS)
        .map(|h| h.message.to_lowercase())
        .collect();
    let asked = |topic: &str| recent.iter().any(|m| m.contains(topic));

    let mut questions = Vec::new();

    if !asked("experience") && !asked("work") && !asked("job") {
        questions.push("Tell me about work experience".to_string());
    }

    if !asked("project") && !profile.projects.is_empty() {
        match profile
            .projects
            .iter()
            .find(|p| !asked(&p.name.to_lowercase()))
        {
            Some(project) => questions.push(format!("Tell me about the {} project", project.name)),
            None => questions.push("What projects have you built?".to_string()),
        }
    }

    if !asked("skill") && !asked("technolog") && !asked("tech") {
        questions.push("What technologies do you work with?".to_string());
    }

    if !asked("achievement") && !asked("award") && !profile.achievements.is_empty() {
        questions.push("Any notable achievements or awards?".to_string());
    }

    if !asked("education") && !asked("study") && !asked("university") {
        questions.push("What's your educational background?".to_string());
    }

    if let Some(exp) = profile
        .experiences
        .iter()
        .find(|e| !asked(&e.company.to_lowercase()))
    {
        questions.push(format!("What was it like working at {}?", exp.company));
    }

    questions.truncate(MAX_SUGGESTIONS);
    questions
}

/// Starters for a fresh conversation, follow-ups otherwise.
pub fn suggest(profile: &Profile, history: &[HistoryEntry]) -> Vec<String> {
    if history.iter().any(|h| h.is_user) {
        follow_up_questions(profile, history)
    } else {
        starter_questions(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Profile {
        Profile::load(None).unwrap()
    }

    fn asked(message: &str) -> HistoryEntry {
        HistoryEntry {
            message: message.to_string(),
            is_user: true,
            timestamp: None,
        }
    }

    #[test]
    fn test_starters_use_profile_details() {
        let profile = profile();
        let questions = starter_questions(&profile);
        assert_eq!(questions.len(), MAX_SUGGESTIONS);
        assert!(questions[0].contains(&profile.profile.name));
        let current = profile.current_experience().unwrap();
        assert!(questions.iter().any(|q| q.contains(&current.company)));
    }

    #[test]
    fn test_follow_ups_skip_asked_topics() {
        let profile = profile();
        let history = vec![asked("Tell me about your work experience")];
        let questions = follow_up_questions(&profile, &history);
        assert!(!questions.contains(&"Tell me about work experience".to_string()));
        assert!(!questions.is_empty());
        assert!(questions.len() <= MAX_SUGGESTIONS);
    }

    #[test]
    fn test_follow_ups_skip_mentioned_projects() {
        let profile = profile();
        let first = profile.projects[0].name.clone();
        let history = vec![asked(&format!("what is {first}?"))];
        let questions = follow_up_questions(&profile, &history);
        assert!(!questions.iter().any(|q| q.contains(&first)));
    }

    #[test]
    fn test_suggest_switches_on_user_history() {
        let profile = profile();
        assert_eq!(suggest(&profile, &[]), starter_questions(&profile));
        let history = vec![asked("skills?")];
        assert_eq!(suggest(&profile, &history), follow_up_questions(&profile, &history));
    }

    #[test]
    fn test_ai_marker_matches_whole_words() {
        assert!(mentions_ai("An AI chat"));
        assert!(mentions_ai("OpenAI API"));
        assert!(!mentions_ai("Maintained services"));
    }
}

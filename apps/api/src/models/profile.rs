use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Profile shipped with the binary; `PROFILE_PATH` replaces it at startup.
const EMBEDDED_PROFILE: &str = include_str!("../../data/profile.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub name: String,
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub github: String,
    #[serde(default)]
    pub github_url: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub linkedin_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillCategory {
    pub category: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub role: String,
    pub company: String,
    pub period: String,
    #[serde(default)]
    pub location: String,
    /// Ordered, most important first.
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub current: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    pub github_url: Option<String>,
    pub live_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Achievement {
    pub title: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Education {
    pub institution: String,
    pub degree: String,
    pub field: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub current: bool,
}

/// The portfolio owner's static profile. Loaded once per process and never
/// mutated by requests; handlers share it through `Arc<Profile>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub profile: PersonalInfo,
    #[serde(default)]
    pub skills: Vec<SkillCategory>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub education: Vec<Education>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Ok,
    Warning,
}

impl Profile {
    /// Loads the profile from `path`, or the embedded document when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read profile at {}", path.display()))?;
                Self::from_json(&raw)
                    .with_context(|| format!("Invalid profile document at {}", path.display()))
            }
            None => Self::from_json(EMBEDDED_PROFILE).context("Invalid embedded profile"),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// A profile is usable for chat when it names someone and has at least
    /// one experience or project to talk about.
    pub fn completeness(&self) -> Completeness {
        let named =
            !self.profile.name.trim().is_empty() && !self.profile.title.trim().is_empty();
        let has_content = !self.experiences.is_empty() || !self.projects.is_empty();
        if named && has_content {
            Completeness::Ok
        } else {
            Completeness::Warning
        }
    }

    pub fn current_experience(&self) -> Option<&Experience> {
        self.experiences.iter().find(|e| e.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_profile_loads() {
        let profile = Profile::load(None).unwrap();
        assert!(!profile.profile.name.is_empty());
        assert!(!profile.experiences.is_empty());
        assert_eq!(profile.completeness(), Completeness::Ok);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"profile": {{"name": "Sam", "title": "Engineer"}}, "projects": [
                {{"name": "X", "description": "Y"}}
            ]}}"#
        )
        .unwrap();

        let profile = Profile::load(Some(file.path())).unwrap();
        assert_eq!(profile.profile.name, "Sam");
        assert!(profile.experiences.is_empty());
        assert!(!profile.projects[0].featured);
        assert_eq!(profile.completeness(), Completeness::Ok);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Profile::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read profile"));
    }

    #[test]
    fn test_profile_without_content_is_incomplete() {
        let profile =
            Profile::from_json(r#"{"profile": {"name": "Sam", "title": "Engineer"}}"#).unwrap();
        assert_eq!(profile.completeness(), Completeness::Warning);
    }

    #[test]
    fn test_current_experience() {
        let profile = Profile::load(None).unwrap();
        let current = profile.current_experience().unwrap();
        assert!(current.current);
    }
}

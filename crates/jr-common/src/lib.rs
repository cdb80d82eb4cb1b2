pub mod config;
pub mod data;
pub mod embedding;
pub mod eval;
pub mod labeling;
pub mod labels;
pub mod logging;
pub mod ltr;
pub mod ranking;
pub mod retrieval;
pub mod skills;

use serde::{Deserialize, Serialize};

// Commonly used data models for the ranking pipeline. Records are loaded
// once and treated as read-only by every component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resume {
    #[serde(default)]
    pub resume_id: Option<String>,
    pub education: String,
    pub projects: String,
    pub experience: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(default)]
    pub job_id: Option<String>,
    pub title: String,
    pub responsibilities: String,
    pub requirements_text: String,
    pub skills: Vec<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

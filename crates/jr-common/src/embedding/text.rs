use crate::{JobPosting, Resume};

/// Serialize a job posting to a single embedding input string. The field
/// order and labels are fixed; changing them changes every embedding.
pub fn job_to_text(job: &JobPosting) -> String {
    let skills_text = job.skills.join(", ");
    [
        format!("Title: {}", job.title),
        format!("Responsibilities: {}", job.responsibilities),
        format!("Requirements: {}", job.requirements_text),
        format!("Skills: {skills_text}"),
    ]
    .join(" ")
}

/// Serialize a resume to a single embedding input string. Same stability
/// contract as `job_to_text`.
pub fn resume_to_text(resume: &Resume) -> String {
    let skills_text = resume.skills.join(", ");
    [
        format!("Education: {}", resume.education),
        format!("Projects: {}", resume.projects),
        format!("Experience: {}", resume.experience),
        format!("Skills: {skills_text}"),
    ]
    .join(" ")
}

//! Applicant profile and generation request shapes.
//!
//! `ProfileForm` mirrors the form the applicant fills in (camelCase JSON);
//! `GenerateRequest` is the body the generation service expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raw profile as collected from the applicant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileForm {
    // Personal
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub nationality: String,
    pub current_education: String,
    pub institution: String,
    pub major: String,
    pub gpa: String,
    pub graduation_date: String,
    // Application
    pub target_country: String,
    pub target_university: String,
    pub target_major: String,
    pub application_deadline: String,
    // Experience
    pub work_experience: String,
    pub research_experience: String,
    pub volunteer_experience: String,
    pub awards: String,
    // Languages
    pub english_test: String,
    pub english_score: String,
    pub other_languages: String,
    // Statement
    pub career_goals: String,
    pub why_this_major: String,
    pub why_this_university: String,
    pub personal_challenges: String,
    pub unique_qualities: String,
    // Other
    pub additional_info: String,
}

/// Document kinds the generation service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    PersonalStatement,
    StatementOfPurpose,
    RecommendationLetterRequest,
    CvEnhancement,
    CoverLetter,
    ResearchProposalSummary,
    MotivationLetter,
}

impl DocumentType {
    /// Wire name of the document type.
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::PersonalStatement => "personal_statement",
            DocumentType::StatementOfPurpose => "statement_of_purpose",
            DocumentType::RecommendationLetterRequest => "recommendation_letter_request",
            DocumentType::CvEnhancement => "cv_enhancement",
            DocumentType::CoverLetter => "cover_letter",
            DocumentType::ResearchProposalSummary => "research_proposal_summary",
            DocumentType::MotivationLetter => "motivation_letter",
        }
    }

    /// Returns all document types for iteration.
    pub fn all() -> &'static [DocumentType] {
        &[
            DocumentType::PersonalStatement,
            DocumentType::StatementOfPurpose,
            DocumentType::RecommendationLetterRequest,
            DocumentType::CvEnhancement,
            DocumentType::CoverLetter,
            DocumentType::ResearchProposalSummary,
            DocumentType::MotivationLetter,
        ]
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    /// Accepts both `personal_statement` and `personal-statement`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        DocumentType::all()
            .iter()
            .copied()
            .find(|ty| ty.as_str() == normalized)
            .ok_or_else(|| format!("Unknown document type: {value}"))
    }
}

/// Applicant summary sent to the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub background: String,
    pub achievements: Vec<String>,
    pub goals: String,
    pub extracurricular_activities: Vec<String>,
}

/// Program the document targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInstitution {
    pub name: String,
    pub program: String,
    pub department: Option<String>,
}

/// Optional generation tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// formal, persuasive, reflective, creative, analytical, objective
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    /// concise, detailed, narrative, academic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// short, medium, long
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_preference: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub custom_prompts: Vec<String>,
}

/// Body of `POST /generate/stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub user_info: UserInfo,
    pub target_institution: TargetInstitution,
    pub document_type: DocumentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GenerationConfig>,
}

/// Separators accepted between award entries (ASCII and full-width).
const AWARD_SEPARATORS: &[char] = &[',', '，', ';', '；', '\n'];

impl GenerateRequest {
    /// Assembles the service request from a filled-in profile.
    pub fn from_profile(
        form: &ProfileForm,
        document_type: DocumentType,
        config: Option<GenerationConfig>,
    ) -> Self {
        let background = format!(
            "{}，{}，{}，GPA: {}，毕业时间: {}",
            form.current_education, form.institution, form.major, form.gpa, form.graduation_date
        );

        let achievements = form
            .awards
            .split(AWARD_SEPARATORS)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();

        let extracurricular_activities = [
            &form.work_experience,
            &form.research_experience,
            &form.volunteer_experience,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();

        Self {
            user_info: UserInfo {
                background,
                achievements,
                goals: form.career_goals.clone(),
                extracurricular_activities,
            },
            target_institution: TargetInstitution {
                name: form.target_university.clone(),
                program: form.target_major.clone(),
                department: None,
            },
            document_type,
            config,
        }
    }

    /// True when the request carries no applicant content at all.
    ///
    /// The background line always holds its fixed labels, so it only counts
    /// when one of its interpolated fields is set.
    pub fn is_empty(&self) -> bool {
        let background_empty = self
            .user_info
            .background
            .split('，')
            .all(|part| {
                let value = part
                    .trim_start_matches("GPA:")
                    .trim_start_matches("毕业时间:")
                    .trim();
                value.is_empty()
            });

        background_empty
            && self.user_info.achievements.is_empty()
            && self.user_info.goals.trim().is_empty()
            && self.user_info.extracurricular_activities.is_empty()
            && self.target_institution.name.trim().is_empty()
            && self.target_institution.program.trim().is_empty()
    }
}

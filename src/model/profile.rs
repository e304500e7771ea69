//! Member profiles
//!
//! Profiles are stored flat: one table, a `profile_type` discriminant,
//! and nullable per-kind columns. Decoding lifts the row into
//! `ProfileDetails` so downstream code matches on a tagged enum, and
//! `UnifiedProfile` flattens everything back down to the card shape the
//! directory renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The member kinds the hub recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Student,
    Researcher,
    Agency,
}

impl ProfileKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(ProfileKind::Student),
            "researcher" => Some(ProfileKind::Researcher),
            "agency" => Some(ProfileKind::Agency),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Student => "student",
            ProfileKind::Researcher => "researcher",
            ProfileKind::Agency => "agency",
        }
    }
}

/// A profile row as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default)]
    pub id: String,
    pub profile_type: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,

    // Student columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,

    // Researcher columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publications: Option<i64>,

    // Agency columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employees: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founded: Option<i32>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Per-kind profile fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProfileDetails {
    Student {
        university: Option<String>,
        major: Option<String>,
        graduation_year: Option<i32>,
    },
    Researcher {
        institution: Option<String>,
        department: Option<String>,
        title: Option<String>,
        publications: Option<i64>,
    },
    Agency {
        agency_type: Option<String>,
        focus_areas: Vec<String>,
        employees: Option<String>,
        founded: Option<i32>,
    },
    /// A discriminant this build does not recognize. The row still
    /// appears in the directory rather than vanishing.
    Unknown { profile_type: String },
}

/// A decoded member profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub interests: Vec<String>,
    pub details: ProfileDetails,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// The recognized kind, None for unknown discriminants
    pub fn kind(&self) -> Option<ProfileKind> {
        match self.details {
            ProfileDetails::Student { .. } => Some(ProfileKind::Student),
            ProfileDetails::Researcher { .. } => Some(ProfileKind::Researcher),
            ProfileDetails::Agency { .. } => Some(ProfileKind::Agency),
            ProfileDetails::Unknown { .. } => None,
        }
    }
}

impl From<ProfileRecord> for Profile {
    fn from(record: ProfileRecord) -> Self {
        let details = match ProfileKind::parse(&record.profile_type) {
            Some(ProfileKind::Student) => ProfileDetails::Student {
                university: record.university,
                major: record.major,
                graduation_year: record.graduation_year,
            },
            Some(ProfileKind::Researcher) => ProfileDetails::Researcher {
                institution: record.institution,
                department: record.department,
                title: record.title,
                publications: record.publications,
            },
            Some(ProfileKind::Agency) => ProfileDetails::Agency {
                agency_type: record.agency_type,
                focus_areas: record.focus_areas,
                employees: record.employees,
                founded: record.founded,
            },
            None => {
                warn!(
                    profile_id = %record.id,
                    profile_type = %record.profile_type,
                    "Unknown profile type in directory row"
                );
                ProfileDetails::Unknown {
                    profile_type: record.profile_type,
                }
            }
        };

        Self {
            id: record.id,
            name: record.name,
            email: record.email,
            location: record.location,
            bio: record.bio,
            avatar_url: record.avatar_url,
            interests: record.interests,
            details,
            created_at: record.created_at,
        }
    }
}

/// The flattened card the directory renders, identical across kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Original discriminant, kept for filtering and display
    pub profile_type: String,
    pub title: String,
    pub organization: String,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UnifiedProfile {
    /// Flatten a profile to its directory card.
    ///
    /// Students lead with their major, researchers with their job
    /// title, agencies with their agency type; an agency is its own
    /// organization. Tags prefer interests and fall back to an agency's
    /// focus areas.
    pub fn project(profile: &Profile) -> Self {
        let (profile_type, title, organization) = match &profile.details {
            ProfileDetails::Student {
                university, major, ..
            } => (
                "student".to_string(),
                major.clone().unwrap_or_else(|| "Student".to_string()),
                university.clone().unwrap_or_default(),
            ),
            ProfileDetails::Researcher {
                institution, title, ..
            } => (
                "researcher".to_string(),
                title.clone().unwrap_or_else(|| "Researcher".to_string()),
                institution.clone().unwrap_or_default(),
            ),
            ProfileDetails::Agency { agency_type, .. } => (
                "agency".to_string(),
                agency_type.clone().unwrap_or_else(|| "Agency".to_string()),
                profile.name.clone(),
            ),
            ProfileDetails::Unknown { profile_type } => {
                (profile_type.clone(), String::new(), String::new())
            }
        };

        let tags = if !profile.interests.is_empty() {
            profile.interests.clone()
        } else if let ProfileDetails::Agency { focus_areas, .. } = &profile.details {
            focus_areas.clone()
        } else {
            Vec::new()
        };

        Self {
            id: profile.id.clone(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            profile_type,
            title,
            organization,
            location: profile.location.clone(),
            bio: profile.bio.clone(),
            avatar_url: profile.avatar_url.clone(),
            tags,
            created_at: profile.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(row: serde_json::Value) -> Profile {
        let record: ProfileRecord = serde_json::from_value(row).unwrap();
        Profile::from(record)
    }

    #[test]
    fn test_student_row_decodes() {
        let profile = decode(json!({
            "id": "p1",
            "profile_type": "student",
            "name": "Dana",
            "email": "dana@example.edu",
            "university": "State University",
            "major": "Social Work",
            "graduation_year": 2027,
            "interests": ["foster care"]
        }));

        assert_eq!(profile.kind(), Some(ProfileKind::Student));
        assert!(matches!(
            profile.details,
            ProfileDetails::Student { ref major, .. } if major.as_deref() == Some("Social Work")
        ));
    }

    #[test]
    fn test_student_projection() {
        let card = UnifiedProfile::project(&decode(json!({
            "profile_type": "student",
            "name": "Dana",
            "university": "State University",
            "major": "Social Work"
        })));

        assert_eq!(card.title, "Social Work");
        assert_eq!(card.organization, "State University");
        assert_eq!(card.profile_type, "student");
    }

    #[test]
    fn test_student_projection_fallbacks() {
        let card = UnifiedProfile::project(&decode(json!({
            "profile_type": "student",
            "name": "Dana"
        })));

        assert_eq!(card.title, "Student");
        assert_eq!(card.organization, "");
    }

    #[test]
    fn test_researcher_projection() {
        let card = UnifiedProfile::project(&decode(json!({
            "profile_type": "researcher",
            "name": "Dr. Reyes",
            "institution": "Child Welfare Institute",
            "title": "Senior Fellow",
            "publications": 12
        })));

        assert_eq!(card.title, "Senior Fellow");
        assert_eq!(card.organization, "Child Welfare Institute");
    }

    #[test]
    fn test_agency_is_its_own_organization() {
        let card = UnifiedProfile::project(&decode(json!({
            "profile_type": "agency",
            "name": "Bright Futures",
            "agency_type": "Nonprofit",
            "focus_areas": ["adoption", "kinship care"]
        })));

        assert_eq!(card.title, "Nonprofit");
        assert_eq!(card.organization, "Bright Futures");
        assert_eq!(card.tags, vec!["adoption", "kinship care"]);
    }

    #[test]
    fn test_interests_win_over_focus_areas() {
        let card = UnifiedProfile::project(&decode(json!({
            "profile_type": "agency",
            "name": "Bright Futures",
            "interests": ["mentoring"],
            "focus_areas": ["adoption"]
        })));

        assert_eq!(card.tags, vec!["mentoring"]);
    }

    #[test]
    fn test_unknown_discriminant_degrades() {
        let profile = decode(json!({
            "profile_type": "community_partner",
            "name": "Side Door"
        }));

        assert_eq!(profile.kind(), None);
        let card = UnifiedProfile::project(&profile);
        assert_eq!(card.profile_type, "community_partner");
        assert_eq!(card.title, "");
        assert_eq!(card.organization, "");
        assert!(card.tags.is_empty());
    }

    #[test]
    fn test_sparse_row_uses_defaults() {
        let profile = decode(json!({
            "profile_type": "researcher",
            "name": "Anonymous"
        }));

        assert_eq!(profile.email, "");
        assert!(profile.interests.is_empty());
        assert!(profile.location.is_none());
    }
}

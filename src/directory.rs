//! Directory filtering
//!
//! Pure, client-side narrowing and ordering of directory cards. The
//! gateway query fetches the pool; this trims it per the member's
//! controls without further requests, so typing in the search box never
//! hits the network.

use serde::{Deserialize, Serialize};

use crate::model::UnifiedProfile;

/// Directory orderings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectorySort {
    #[default]
    Name,
    NameDesc,
    Recent,
}

impl DirectorySort {
    /// Parse a sort token. Unknown tokens fall back to name order.
    pub fn parse(s: &str) -> Self {
        match s {
            "name-desc" => DirectorySort::NameDesc,
            "recent" => DirectorySort::Recent,
            _ => DirectorySort::Name,
        }
    }
}

/// Member-facing directory controls
#[derive(Debug, Clone, Default)]
pub struct DirectoryFilter {
    /// Case-insensitive substring over name, email, and organization
    pub search: Option<String>,
    /// Every listed tag must be present on the card, matched exactly
    pub tags: Vec<String>,
    /// Case-insensitive substring over location
    pub location: Option<String>,
    pub sort: DirectorySort,
}

impl DirectoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = Some(search.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    pub fn with_sort(mut self, sort: DirectorySort) -> Self {
        self.sort = sort;
        self
    }

    fn matches(&self, card: &UnifiedProfile) -> bool {
        if let Some(search) = self.search.as_deref() {
            let needle = search.to_lowercase();
            let hit = card.name.to_lowercase().contains(&needle)
                || card.email.to_lowercase().contains(&needle)
                || card.organization.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }

        if !self
            .tags
            .iter()
            .all(|tag| card.tags.iter().any(|t| t == tag))
        {
            return false;
        }

        if let Some(location) = self.location.as_deref() {
            let needle = location.to_lowercase();
            let hit = card
                .location
                .as_deref()
                .map(|loc| loc.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if !hit {
                return false;
            }
        }

        true
    }
}

/// Apply directory controls to a batch of cards
pub fn filter_and_sort(cards: &[UnifiedProfile], filter: &DirectoryFilter) -> Vec<UnifiedProfile> {
    let mut kept: Vec<UnifiedProfile> = cards
        .iter()
        .filter(|card| filter.matches(card))
        .cloned()
        .collect();

    match filter.sort {
        DirectorySort::Name => {
            kept.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        }
        DirectorySort::NameDesc => {
            kept.sort_by(|a, b| b.name.to_lowercase().cmp(&a.name.to_lowercase()))
        }
        DirectorySort::Recent => kept.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(
        name: &str,
        organization: &str,
        tags: &[&str],
        location: Option<&str>,
        created_at: &str,
    ) -> UnifiedProfile {
        UnifiedProfile {
            id: name.to_lowercase(),
            name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            profile_type: "student".to_string(),
            title: "Student".to_string(),
            organization: organization.to_string(),
            location: location.map(str::to_string),
            bio: None,
            avatar_url: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: created_at.parse().unwrap(),
        }
    }

    fn sample() -> Vec<UnifiedProfile> {
        vec![
            card(
                "Bob",
                "State University",
                &["adoption"],
                Some("Portland, OR"),
                "2026-01-10T00:00:00Z",
            ),
            card(
                "alice",
                "Bright Futures",
                &["adoption", "kinship"],
                Some("Seattle, WA"),
                "2026-03-01T00:00:00Z",
            ),
            card("Carol", "CWI", &[], None, "2026-02-01T00:00:00Z"),
        ]
    }

    #[test]
    fn test_name_sort_ignores_case() {
        let sorted = filter_and_sort(&sample(), &DirectoryFilter::new());
        let names: Vec<&str> = sorted.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "Bob", "Carol"]);
    }

    #[test]
    fn test_name_desc_and_recent_sorts() {
        let desc = filter_and_sort(
            &sample(),
            &DirectoryFilter::new().with_sort(DirectorySort::NameDesc),
        );
        let names: Vec<&str> = desc.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Carol", "Bob", "alice"]);

        let recent = filter_and_sort(
            &sample(),
            &DirectoryFilter::new().with_sort(DirectorySort::Recent),
        );
        let names: Vec<&str> = recent.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "Carol", "Bob"]);
    }

    #[test]
    fn test_search_covers_organization() {
        let hits = filter_and_sort(&sample(), &DirectoryFilter::new().with_search("bright"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "alice");
    }

    #[test]
    fn test_search_covers_email() {
        let hits = filter_and_sort(&sample(), &DirectoryFilter::new().with_search("CAROL@"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Carol");
    }

    #[test]
    fn test_tags_all_must_match_exactly() {
        let one = filter_and_sort(&sample(), &DirectoryFilter::new().with_tags(&["adoption"]));
        assert_eq!(one.len(), 2);

        let both = filter_and_sort(
            &sample(),
            &DirectoryFilter::new().with_tags(&["adoption", "kinship"]),
        );
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].name, "alice");

        // Tag matching is exact, not case-folded
        let cased = filter_and_sort(&sample(), &DirectoryFilter::new().with_tags(&["Adoption"]));
        assert!(cased.is_empty());
    }

    #[test]
    fn test_location_substring() {
        let hits = filter_and_sort(&sample(), &DirectoryFilter::new().with_location("seattle"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "alice");

        // Cards without a location never match a location filter
        let none = filter_and_sort(&sample(), &DirectoryFilter::new().with_location("OR"));
        assert_eq!(none.len(), 1);
        assert_eq!(none[0].name, "Bob");
    }

    #[test]
    fn test_sort_token_parse() {
        assert_eq!(DirectorySort::parse("recent"), DirectorySort::Recent);
        assert_eq!(DirectorySort::parse("name-desc"), DirectorySort::NameDesc);
        assert_eq!(DirectorySort::parse("bogus"), DirectorySort::Name);
    }
}

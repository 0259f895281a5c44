//! The fixed catalogue of pages that take part in dwell-time measurement.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Landing-page variant a tracked page belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    A,
    B,
}

/// A page whose visits are timed.
///
/// Entry pages open an interval and accept a `uid` query parameter.
/// Terminal pages close the open interval without opening a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum TrackedPage {
    Home,
    LearnMore,
    Confirmation,
    HomeB,
    LearnMoreB,
    ConfirmationB,
}

impl TrackedPage {
    pub const ALL: [TrackedPage; 6] = [
        TrackedPage::Home,
        TrackedPage::LearnMore,
        TrackedPage::Confirmation,
        TrackedPage::HomeB,
        TrackedPage::LearnMoreB,
        TrackedPage::ConfirmationB,
    ];

    /// Map a request path to a tracked page.
    ///
    /// Anything after `?` is ignored. Matching is exact: `/learn_more/` is
    /// not tracked.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        match path {
            "/" => Some(Self::Home),
            "/learn_more" => Some(Self::LearnMore),
            "/confirmation" => Some(Self::Confirmation),
            "/website_b" => Some(Self::HomeB),
            "/learn_more_b" => Some(Self::LearnMoreB),
            "/confirmation_b" => Some(Self::ConfirmationB),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::LearnMore => "/learn_more",
            Self::Confirmation => "/confirmation",
            Self::HomeB => "/website_b",
            Self::LearnMoreB => "/learn_more_b",
            Self::ConfirmationB => "/confirmation_b",
        }
    }

    /// The value written to the `page` column.
    pub fn label(self) -> &'static str {
        match self {
            Self::Home => "HomePage",
            Self::LearnMore => "Learn More",
            Self::Confirmation => "Confirmation",
            Self::HomeB => "HomePage B",
            Self::LearnMoreB => "Learn More B",
            Self::ConfirmationB => "Confirmation B",
        }
    }

    /// Inverse of [`TrackedPage::label`].
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.label() == label)
    }

    pub fn is_entry(self) -> bool {
        matches!(self, Self::Home | Self::HomeB)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmation | Self::ConfirmationB)
    }

    pub fn variant(self) -> Variant {
        match self {
            Self::Home | Self::LearnMore | Self::Confirmation => Variant::A,
            Self::HomeB | Self::LearnMoreB | Self::ConfirmationB => Variant::B,
        }
    }
}

impl fmt::Display for TrackedPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<TrackedPage> for &'static str {
    fn from(page: TrackedPage) -> Self {
        page.label()
    }
}

impl TryFrom<String> for TrackedPage {
    type Error = String;

    fn try_from(label: String) -> Result<Self, Self::Error> {
        Self::parse(&label).ok_or_else(|| format!("unknown tracked page: {label}"))
    }
}

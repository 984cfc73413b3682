use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::defs::DefinitionError;

/// `{value, display_name}` pair used when listing enum cases to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnumOption {
    pub value: &'static str,
    pub display_name: &'static str,
}

/// Closed enums with a wire value and a human label.
pub trait Labelled: Copy {
    fn value(&self) -> &'static str;
    fn display_name(&self) -> &'static str;

    fn option(&self) -> EnumOption {
        EnumOption {
            value: self.value(),
            display_name: self.display_name(),
        }
    }
}

/// Serializes a `Labelled` field as `{value, display_name}`.
pub fn serialize_labelled<T, S>(item: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Labelled,
    S: Serializer,
{
    item.option().serialize(serializer)
}

/// Canonical content taxonomy every provider vocabulary is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Business,
    Technology,
    Sports,
    Entertainment,
    Health,
    Science,
    Politics,
    World,
    National,
    Local,
    Opinion,
    Arts,
    Food,
    Travel,
    Education,
}

impl Category {
    pub const ALL: [Category; 15] = [
        Category::Business,
        Category::Technology,
        Category::Sports,
        Category::Entertainment,
        Category::Health,
        Category::Science,
        Category::Politics,
        Category::World,
        Category::National,
        Category::Local,
        Category::Opinion,
        Category::Arts,
        Category::Food,
        Category::Travel,
        Category::Education,
    ];

    /// Target of every provider mapping that does not recognise its input.
    pub const FALLBACK: Category = Category::World;

    pub fn options() -> Vec<EnumOption> {
        Self::ALL.iter().map(Labelled::option).collect()
    }

    /// Lenient lookup of a canonical value, ignoring case and surrounding whitespace.
    pub fn from_value(value: &str) -> Option<Category> {
        let value = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.value().eq_ignore_ascii_case(value))
    }
}

impl Labelled for Category {
    fn value(&self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::Technology => "technology",
            Category::Sports => "sports",
            Category::Entertainment => "entertainment",
            Category::Health => "health",
            Category::Science => "science",
            Category::Politics => "politics",
            Category::World => "world",
            Category::National => "national",
            Category::Local => "local",
            Category::Opinion => "opinion",
            Category::Arts => "arts",
            Category::Food => "food",
            Category::Travel => "travel",
            Category::Education => "education",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Category::Business => "Business",
            Category::Technology => "Technology",
            Category::Sports => "Sports",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
            Category::Science => "Science",
            Category::Politics => "Politics",
            Category::World => "World",
            Category::National => "National",
            Category::Local => "Local",
            Category::Opinion => "Opinion",
            Category::Arts => "Arts",
            Category::Food => "Food",
            Category::Travel => "Travel",
            Category::Education => "Education",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for Category {
    type Err = DefinitionError;

    /// Strict parse: only the exact canonical value is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.value() == s)
            .ok_or_else(|| DefinitionError::UnknownCategory(s.to_string()))
    }
}

/// Originating provider. Declaration order is the merge order of an ingest cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "news_api")]
    NewsApi,
    #[serde(rename = "the_guardian")]
    TheGuardian,
    #[serde(rename = "new_york_times")]
    NewYorkTimes,
    #[serde(rename = "mediastack")]
    MediaStack,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::NewsApi,
        Source::TheGuardian,
        Source::NewYorkTimes,
        Source::MediaStack,
    ];

    pub fn options() -> Vec<EnumOption> {
        Self::ALL.iter().map(Labelled::option).collect()
    }

    pub fn api_endpoint(&self) -> &'static str {
        match self {
            Source::NewsApi => "https://newsapi.org/v2",
            Source::TheGuardian => "https://content.guardianapis.com",
            Source::NewYorkTimes => "https://api.nytimes.com/svc",
            Source::MediaStack => "http://api.mediastack.com/v1",
        }
    }
}

impl Labelled for Source {
    fn value(&self) -> &'static str {
        match self {
            Source::NewsApi => "news_api",
            Source::TheGuardian => "the_guardian",
            Source::NewYorkTimes => "new_york_times",
            Source::MediaStack => "mediastack",
        }
    }

    fn display_name(&self) -> &'static str {
        match self {
            Source::NewsApi => "News API",
            Source::TheGuardian => "The Guardian",
            Source::NewYorkTimes => "New York Times",
            Source::MediaStack => "MediaStack",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for Source {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|source| source.value() == s)
            .ok_or_else(|| DefinitionError::UnknownSource(s.to_string()))
    }
}

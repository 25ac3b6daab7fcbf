// Estimate cards: the fixed planning poker deck.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single card in the estimation deck.
///
/// Serialized as the card's wire string ("1/2", "13", "?", "coffee", ...),
/// which is also what other clients store under `selectedCard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Estimate {
    #[serde(rename = "1/2")]
    Half,
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "13")]
    Thirteen,
    #[serde(rename = "20")]
    Twenty,
    #[serde(rename = "40")]
    Forty,
    #[serde(rename = "100")]
    Hundred,
    /// Unknown complexity.
    #[serde(rename = "?")]
    Unknown,
    /// Skip / pass on this item.
    #[serde(rename = "coffee")]
    Coffee,
}

/// The deck in display order.
pub const DECK: [Estimate; 12] = [
    Estimate::Half,
    Estimate::One,
    Estimate::Two,
    Estimate::Three,
    Estimate::Five,
    Estimate::Eight,
    Estimate::Thirteen,
    Estimate::Twenty,
    Estimate::Forty,
    Estimate::Hundred,
    Estimate::Unknown,
    Estimate::Coffee,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown estimate card: {0:?}")]
pub struct EstimateParseError(pub String);

impl Estimate {
    /// The wire string for this card.
    pub fn as_str(self) -> &'static str {
        match self {
            Estimate::Half => "1/2",
            Estimate::One => "1",
            Estimate::Two => "2",
            Estimate::Three => "3",
            Estimate::Five => "5",
            Estimate::Eight => "8",
            Estimate::Thirteen => "13",
            Estimate::Twenty => "20",
            Estimate::Forty => "40",
            Estimate::Hundred => "100",
            Estimate::Unknown => "?",
            Estimate::Coffee => "coffee",
        }
    }

    /// Numeric story points, or `None` for cards excluded from aggregation.
    pub fn points(self) -> Option<f64> {
        match self {
            Estimate::Half => Some(0.5),
            Estimate::Unknown | Estimate::Coffee => None,
            other => other.as_str().parse().ok(),
        }
    }

    /// Whether this card takes part in numeric aggregation.
    pub fn is_numeric(self) -> bool {
        self.points().is_some()
    }

    /// Short label printed on the card face.
    pub fn label(self) -> &'static str {
        match self {
            Estimate::Half => "½",
            Estimate::Coffee => "Skip",
            other => other.as_str(),
        }
    }

    /// Sentence describing the current selection.
    pub fn description(self) -> String {
        match self {
            Estimate::Half => "Half story point".to_string(),
            Estimate::Unknown => "Unknown complexity".to_string(),
            Estimate::Coffee => "Skip this item".to_string(),
            other => format!("{} story points", other.as_str()),
        }
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Estimate {
    type Err = EstimateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DECK.iter()
            .copied()
            .find(|card| card.as_str() == s.trim())
            .ok_or_else(|| EstimateParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_order_matches_wire_strings() {
        let wire: Vec<&str> = DECK.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            wire,
            vec!["1/2", "1", "2", "3", "5", "8", "13", "20", "40", "100", "?", "coffee"]
        );
    }

    #[test]
    fn points_for_numeric_cards() {
        assert_eq!(Estimate::Half.points(), Some(0.5));
        assert_eq!(Estimate::Thirteen.points(), Some(13.0));
        assert_eq!(Estimate::Hundred.points(), Some(100.0));
    }

    #[test]
    fn special_cards_have_no_points() {
        assert_eq!(Estimate::Unknown.points(), None);
        assert_eq!(Estimate::Coffee.points(), None);
        assert!(!Estimate::Coffee.is_numeric());
    }

    #[test]
    fn parse_accepts_every_card() {
        for card in DECK {
            assert_eq!(card.as_str().parse::<Estimate>(), Ok(card));
        }
    }

    #[test]
    fn parse_rejects_unknown_strings() {
        assert!("4".parse::<Estimate>().is_err());
        assert!("".parse::<Estimate>().is_err());
        assert!("Coffee".parse::<Estimate>().is_err());
    }

    #[test]
    fn serde_uses_wire_strings() {
        assert_eq!(serde_json::to_string(&Estimate::Half).unwrap(), "\"1/2\"");
        let card: Estimate = serde_json::from_str("\"coffee\"").unwrap();
        assert_eq!(card, Estimate::Coffee);
    }

    #[test]
    fn labels_and_descriptions() {
        assert_eq!(Estimate::Half.label(), "½");
        assert_eq!(Estimate::Coffee.label(), "Skip");
        assert_eq!(Estimate::Eight.label(), "8");
        assert_eq!(Estimate::Half.description(), "Half story point");
        assert_eq!(Estimate::Unknown.description(), "Unknown complexity");
        assert_eq!(Estimate::Five.description(), "5 story points");
    }
}

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The six fixed "guru" rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strategy {
    Graham,
    Fisher,
    Lynch,
    Livermore,
    Minervini,
    ONeil,
}

impl Strategy {
    pub const ALL: [Strategy; 6] = [
        Strategy::Graham,
        Strategy::Fisher,
        Strategy::Lynch,
        Strategy::Livermore,
        Strategy::Minervini,
        Strategy::ONeil,
    ];

    /// Short key used in the HTTP API (`?giant=Graham`).
    pub fn key(self) -> &'static str {
        match self {
            Strategy::Graham => "Graham",
            Strategy::Fisher => "Fisher",
            Strategy::Lynch => "Lynch",
            Strategy::Livermore => "Livermore",
            Strategy::Minervini => "Minervini",
            Strategy::ONeil => "ONeil",
        }
    }

    /// Column in pick files and `account_list.acc_name` in Postgres.
    pub fn pick_column(self) -> &'static str {
        match self {
            Strategy::Graham => "Graham_Pick",
            Strategy::Fisher => "Fisher_Pick",
            Strategy::Lynch => "Lynch_Pick",
            Strategy::Livermore => "Livermore_Pick",
            Strategy::Minervini => "Minervini_Pick",
            Strategy::ONeil => "ONeil_Pick",
        }
    }

    /// Only the value-oriented strategies carry a weighted score.
    pub fn score_column(self) -> Option<&'static str> {
        match self {
            Strategy::Graham => Some("Graham_Score"),
            Strategy::Fisher => Some("Fisher_Score"),
            Strategy::Lynch => Some("Lynch_Score"),
            Strategy::Livermore | Strategy::Minervini | Strategy::ONeil => None,
        }
    }

    /// Display name stored in the today's-picks history.
    pub fn giant_name(self) -> &'static str {
        match self {
            Strategy::Graham => "Benjamin Graham",
            Strategy::Fisher => "Ken Fisher",
            Strategy::Lynch => "Peter Lynch",
            Strategy::Livermore => "Jesse Livermore",
            Strategy::Minervini => "Mark Minervini",
            Strategy::ONeil => "William Oneil",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Strategy::Graham => "benjamin_graham",
            Strategy::Fisher => "ken_fisher",
            Strategy::Lynch => "peter_lynch",
            Strategy::Livermore => "jesse_livermore",
            Strategy::Minervini => "mark_minervini",
            Strategy::ONeil => "william_oneil",
        }
    }

    /// Accepts the key, pick column, display name or slug, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim().to_ascii_lowercase().replace(['\'', ' '], "_");
        Strategy::ALL.into_iter().find(|st| {
            [st.key(), st.pick_column(), st.giant_name(), st.slug()]
                .iter()
                .any(|alias| alias.to_ascii_lowercase().replace(' ', "_") == needle)
        })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.giant_name())
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::parse(s).ok_or_else(|| anyhow::anyhow!("unknown strategy {s:?}"))
    }
}

impl Serialize for Strategy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_alias() {
        for st in Strategy::ALL {
            assert_eq!(Strategy::parse(st.key()), Some(st));
            assert_eq!(Strategy::parse(st.pick_column()), Some(st));
            assert_eq!(Strategy::parse(st.giant_name()), Some(st));
            assert_eq!(Strategy::parse(st.slug()), Some(st));
        }
        assert_eq!(Strategy::parse("oneil"), Some(Strategy::ONeil));
        assert_eq!(Strategy::parse("William O'Neil"), None);
        assert!("buffett".parse::<Strategy>().is_err());
    }

    #[test]
    fn only_value_strategies_are_scored() {
        let scored: Vec<_> = Strategy::ALL
            .into_iter()
            .filter(|s| s.score_column().is_some())
            .collect();
        assert_eq!(scored, vec![Strategy::Graham, Strategy::Fisher, Strategy::Lynch]);
    }
}

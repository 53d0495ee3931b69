use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the dining locations whose weekly menu is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Cafeteria {
    Zentralmensa,
    MensaAmTurm,
    Nordmensa,
    MensaItalia,
    BistroHawk,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CafeteriaError {
    #[error("unknown cafeteria code '{0}'")]
    UnknownCode(char),
    #[error("unknown cafeteria '{0}'")]
    UnknownName(String),
}

impl Cafeteria {
    pub const ALL: [Cafeteria; 5] = [
        Cafeteria::Zentralmensa,
        Cafeteria::MensaAmTurm,
        Cafeteria::Nordmensa,
        Cafeteria::MensaItalia,
        Cafeteria::BistroHawk,
    ];

    /// Single-character code used in compact URLs.
    pub fn code(self) -> char {
        match self {
            Cafeteria::Zentralmensa => 'z',
            Cafeteria::MensaAmTurm => 't',
            Cafeteria::Nordmensa => 'n',
            Cafeteria::MensaItalia => 'i',
            Cafeteria::BistroHawk => 'h',
        }
    }

    /// Display name, also the key of the menu corpus.
    pub fn name(self) -> &'static str {
        match self {
            Cafeteria::Zentralmensa => "Zentralmensa",
            Cafeteria::MensaAmTurm => "Mensa am Turm",
            Cafeteria::Nordmensa => "Nordmensa",
            Cafeteria::MensaItalia => "Mensa Italia",
            Cafeteria::BistroHawk => "Bistro HAWK",
        }
    }

    pub fn from_code(code: char) -> Result<Self, CafeteriaError> {
        Self::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(CafeteriaError::UnknownCode(code))
    }

    pub fn from_name(name: &str) -> Result<Self, CafeteriaError> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| CafeteriaError::UnknownName(name.to_string()))
    }
}

impl std::fmt::Display for Cafeteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Cafeteria {
    type Err = CafeteriaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

impl Serialize for Cafeteria {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Cafeteria {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Self::from_name(&name).map_err(serde::de::Error::custom)
    }
}

/// Decode a compact code list such as `"zn"`. The empty string selects every
/// cafeteria.
pub fn decode_list(codes: &str) -> Result<Vec<Cafeteria>, CafeteriaError> {
    if codes.is_empty() {
        return Ok(Cafeteria::ALL.to_vec());
    }
    codes.chars().map(Cafeteria::from_code).collect()
}

pub fn encode_list(cafeterias: &[Cafeteria]) -> String {
    cafeterias.iter().map(|c| c.code()).collect()
}

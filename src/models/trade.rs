use std::fmt;

/// Whether the caller fixed the input amount or the output amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeType {
    ExactInput,
    ExactOutput,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::ExactInput => "exactIn",
            TradeType::ExactOutput => "exactOut",
        }
    }

    /// Discrete index used inside storage keys. Stable across releases:
    /// stored partition keys embed this value.
    pub fn index(&self) -> u8 {
        match self {
            TradeType::ExactInput => 0,
            TradeType::ExactOutput => 1,
        }
    }

    pub fn from_str(value: &str) -> Option<TradeType> {
        match value {
            "exactIn" => Some(TradeType::ExactInput),
            "exactOut" => Some(TradeType::ExactOutput),
            _ => None,
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Chemical elements the potential has atomic networks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Element {
    H,
    C,
    N,
    O,
}

impl Element {
    pub const COUNT: usize = 4;
    pub const ALL: [Element; Element::COUNT] = [Element::H, Element::C, Element::N, Element::O];

    /// Position of this element in per-element tables.
    pub fn index(self) -> usize {
        match self {
            Element::H => 0,
            Element::C => 1,
            Element::N => 2,
            Element::O => 3,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Element::H => "H",
            Element::C => "C",
            Element::N => "N",
            Element::O => "O",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "H" | "h" => Ok(Element::H),
            "C" | "c" => Ok(Element::C),
            "N" | "n" => Ok(Element::N),
            "O" | "o" => Ok(Element::O),
            other => Err(Error::UnknownElement(other.to_string())),
        }
    }
}

impl TryFrom<String> for Element {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Element> for String {
    fn from(e: Element) -> String {
        e.symbol().to_string()
    }
}

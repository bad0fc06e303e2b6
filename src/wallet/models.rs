use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Payment network of a saved card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Mir,
}

impl CardNetwork {
    pub const ALL: [CardNetwork; 5] = [
        CardNetwork::Visa,
        CardNetwork::Mastercard,
        CardNetwork::Amex,
        CardNetwork::Discover,
        CardNetwork::Mir,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            CardNetwork::Visa => "visa",
            CardNetwork::Mastercard => "mastercard",
            CardNetwork::Amex => "amex",
            CardNetwork::Discover => "discover",
            CardNetwork::Mir => "mir",
        }
    }

    /// Guess the network from the leading digits of a card number
    pub fn detect(digits: &str) -> Option<Self> {
        let prefix = |len: usize| -> Option<u32> { digits.get(..len)?.parse().ok() };

        if digits.starts_with('4') {
            return Some(CardNetwork::Visa);
        }
        if matches!(prefix(2), Some(34 | 37)) {
            return Some(CardNetwork::Amex);
        }
        if matches!(prefix(4), Some(2200..=2204)) {
            return Some(CardNetwork::Mir);
        }
        if matches!(prefix(2), Some(51..=55)) || matches!(prefix(4), Some(2221..=2720)) {
            return Some(CardNetwork::Mastercard);
        }
        if matches!(prefix(4), Some(6011))
            || matches!(prefix(2), Some(65))
            || matches!(prefix(3), Some(644..=649))
        {
            return Some(CardNetwork::Discover);
        }
        None
    }

    /// Digits in the security code printed on this network's cards
    pub fn security_code_len(self) -> usize {
        match self {
            CardNetwork::Amex => 4,
            _ => 3,
        }
    }
}

impl fmt::Display for CardNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CardNetwork::Visa => "Visa",
            CardNetwork::Mastercard => "Mastercard",
            CardNetwork::Amex => "American Express",
            CardNetwork::Discover => "Discover",
            CardNetwork::Mir => "Mir",
        };
        f.pad(name)
    }
}

/// Random identifier of a saved card
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn generate() -> Self {
        Self(hex::encode(rand::random::<[u8; 8]>()))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount in minor units (cents)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Card number reduced to its last four digits.
///
/// Whatever is deserialized is masked again, so full numbers written by
/// older versions never make it back into memory or storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedNumber {
    last4: String,
}

impl MaskedNumber {
    pub fn mask(number: &str) -> Self {
        let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
        let start = digits.len().saturating_sub(4);
        Self {
            last4: digits[start..].iter().collect(),
        }
    }

    pub fn last4(&self) -> &str {
        &self.last4
    }
}

impl fmt::Display for MaskedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "•••• {}", self.last4)
    }
}

impl Serialize for MaskedNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MaskedNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::mask(&s))
    }
}

/// A saved payment card as persisted in the wallet.
///
/// Unknown fields, including a `cvc` left behind by older versions, are
/// dropped on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    #[serde(rename = "type")]
    pub network: CardNetwork,
    pub number: MaskedNumber,
    pub holder: String,
    /// `MM/YY`
    pub expiry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Money>,
}

/// Card details as submitted by the user
#[derive(Clone, Default)]
pub struct CardForm {
    /// Detected from the number when not chosen
    pub network: Option<CardNetwork>,
    pub number: String,
    pub holder: String,
    pub expiry: String,
    pub cvc: String,
}

impl fmt::Debug for CardForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardForm")
            .field("network", &self.network)
            .field("number", &MaskedNumber::mask(&self.number))
            .field("holder", &self.holder)
            .field("expiry", &self.expiry)
            .field("cvc", &"***")
            .finish()
    }
}

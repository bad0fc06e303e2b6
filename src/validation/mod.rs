pub mod pure;

use chrono::NaiveDate;

use crate::error::CardFormError;
use crate::wallet::models::{CardForm, CardNetwork};
use pure::{is_expired, luhn_valid, normalize_number, parse_expiry};

/// Card form that passed every check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedCard {
    pub network: CardNetwork,
    pub digits: String,
    pub holder: String,
    /// Normalized to `MM/YY`
    pub expiry: String,
}

/// Validate a submitted card form as of `today`.
///
/// The security code is checked here and goes no further: it is not part of
/// the result.
pub fn validate_card_form(
    form: &CardForm,
    today: NaiveDate,
) -> Result<ValidatedCard, CardFormError> {
    let holder = form.holder.trim();
    if holder.is_empty() {
        return Err(CardFormError::MissingHolder);
    }

    let digits = normalize_number(&form.number).ok_or(CardFormError::InvalidNumberCharacters)?;
    if !(12..=19).contains(&digits.len()) {
        return Err(CardFormError::InvalidNumberLength);
    }
    if !luhn_valid(&digits) {
        return Err(CardFormError::InvalidChecksum);
    }

    let network = form
        .network
        .or_else(|| CardNetwork::detect(&digits))
        .ok_or(CardFormError::UnknownNetwork)?;

    let (month, year) = parse_expiry(&form.expiry).ok_or(CardFormError::InvalidExpiryFormat)?;
    if is_expired(month, year, today) {
        return Err(CardFormError::Expired);
    }

    let expected = network.security_code_len();
    let cvc = form.cvc.trim();
    if cvc.len() != expected || !cvc.chars().all(|c| c.is_ascii_digit()) {
        return Err(CardFormError::InvalidSecurityCode { expected });
    }

    Ok(ValidatedCard {
        network,
        digits,
        holder: holder.to_string(),
        expiry: format!("{:02}/{:02}", month, year % 100),
    })
}

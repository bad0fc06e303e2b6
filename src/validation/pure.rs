use chrono::{Datelike, NaiveDate};

/// Strip the separators people type into card numbers.
///
/// Returns `None` if anything other than digits, spaces or dashes is present.
pub fn normalize_number(input: &str) -> Option<String> {
    let mut digits = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' => {}
            _ => return None,
        }
    }
    Some(digits)
}

/// Luhn (mod 10) checksum
pub fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    !digits.is_empty() && sum % 10 == 0
}

/// Parse `MM/YY` (also accepts `MM/YYYY`) into month and full year
pub fn parse_expiry(input: &str) -> Option<(u32, i32)> {
    let (month, year) = input.trim().split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }

    let year = year.trim();
    let year: i32 = match year.len() {
        2 => 2000 + year.parse::<i32>().ok()?,
        4 => year.parse().ok()?,
        _ => return None,
    };

    Some((month, year))
}

/// A card is valid through the last day of its expiry month
pub fn is_expired(month: u32, year: i32, today: NaiveDate) -> bool {
    (year, month) < (today.year(), today.month())
}

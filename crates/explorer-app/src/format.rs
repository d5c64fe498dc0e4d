// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::CellValue;
use anyhow::{Result, bail};
use std::collections::BTreeSet;

pub const DEFAULT_MONEY_COLUMNS: [&str; 1] = ["total_spent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
    Cad,
    Aud,
    Inr,
    Chf,
}

impl Currency {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
            Self::Gbp => "£",
            Self::Jpy => "¥",
            Self::Cad => "CA$",
            Self::Aud => "A$",
            Self::Inr => "₹",
            Self::Chf => "CHF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            "GBP" => Some(Self::Gbp),
            "JPY" => Some(Self::Jpy),
            "CAD" => Some(Self::Cad),
            "AUD" => Some(Self::Aud),
            "INR" => Some(Self::Inr),
            "CHF" => Some(Self::Chf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    EnUs,
    EnGb,
    DeDe,
    FrFr,
}

impl Locale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().replace('_', "-").to_ascii_lowercase().as_str() {
            "en-us" => Some(Self::EnUs),
            "en-gb" => Some(Self::EnGb),
            "de-de" => Some(Self::DeDe),
            "fr-fr" => Some(Self::FrFr),
            _ => None,
        }
    }

    const fn group_separator(self) -> &'static str {
        match self {
            Self::EnUs | Self::EnGb => ",",
            Self::DeDe => ".",
            Self::FrFr => "\u{202f}",
        }
    }

    const fn decimal_separator(self) -> &'static str {
        match self {
            Self::EnUs | Self::EnGb => ".",
            Self::DeDe | Self::FrFr => ",",
        }
    }

    const fn symbol_trails(self) -> bool {
        matches!(self, Self::DeDe | Self::FrFr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyFormat {
    pub currency: Currency,
    pub locale: Locale,
}

impl Default for MoneyFormat {
    fn default() -> Self {
        Self {
            currency: Currency::Usd,
            locale: Locale::EnUs,
        }
    }
}

impl MoneyFormat {
    pub fn from_codes(currency: &str, locale: &str) -> Result<Self> {
        let Some(currency) = Currency::parse(currency) else {
            bail!("unsupported currency {currency:?}; use one of USD, EUR, GBP, JPY, CAD, AUD, INR, CHF");
        };
        let Some(locale) = Locale::parse(locale) else {
            bail!("unsupported locale {locale:?}; use one of en-US, en-GB, de-DE, fr-FR");
        };
        Ok(Self { currency, locale })
    }

    pub fn format(&self, amount: f64) -> String {
        let fixed = format!("{:.2}", amount.abs());
        let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
        let negative = amount < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');
        let sign = if negative { "-" } else { "" };

        let number = format!(
            "{}{}{}",
            group_digits(whole, self.locale.group_separator()),
            self.locale.decimal_separator(),
            fraction
        );
        let symbol = self.currency.symbol();
        if self.locale.symbol_trails() {
            format!("{sign}{number}\u{a0}{symbol}")
        } else {
            format!("{sign}{symbol}{number}")
        }
    }
}

fn group_digits(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (len - index) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFormatter {
    money_columns: BTreeSet<String>,
    money: MoneyFormat,
}

impl Default for CellFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_MONEY_COLUMNS, MoneyFormat::default())
    }
}

impl CellFormatter {
    pub fn new<I, S>(money_columns: I, money: MoneyFormat) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            money_columns: money_columns.into_iter().map(Into::into).collect(),
            money,
        }
    }

    pub fn is_money_column(&self, column: &str) -> bool {
        self.money_columns.contains(column)
    }

    pub fn money_format(&self) -> MoneyFormat {
        self.money
    }

    pub fn format(&self, value: &CellValue, column: &str) -> String {
        if self.is_money_column(column)
            && let Some(amount) = value.as_number()
        {
            return self.money.format(amount);
        }

        match value {
            CellValue::Null => String::new(),
            CellValue::Number(number) => number.to_string(),
            CellValue::Text(text) => text.clone(),
        }
    }
}

pub fn derive_label(column: &str) -> String {
    column
        .split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

//! Amazon marketplaces: domains, currencies, locale conventions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Static description of a marketplace.
#[derive(Debug)]
pub struct MarketProfile {
    pub code: &'static str,
    pub domain: &'static str,
    pub currency: &'static str,
    pub accept_language: &'static str,
    /// Value of the `lc-main` cookie a browser in this market carries.
    pub locale: &'static str,
    pub comma_decimal: bool,
    aliases: &'static [&'static str],
}

const PROFILES: [MarketProfile; 15] = [
    MarketProfile {
        code: "us",
        domain: "amazon.com",
        currency: "USD",
        accept_language: "en-US,en;q=0.9",
        locale: "en_US",
        comma_decimal: false,
        aliases: &["usa", "united states"],
    },
    MarketProfile {
        code: "uk",
        domain: "amazon.co.uk",
        currency: "GBP",
        accept_language: "en-GB,en;q=0.9",
        locale: "en_GB",
        comma_decimal: false,
        aliases: &["gb", "united kingdom"],
    },
    MarketProfile {
        code: "de",
        domain: "amazon.de",
        currency: "EUR",
        accept_language: "de-DE,de;q=0.9,en;q=0.8",
        locale: "de_DE",
        comma_decimal: true,
        aliases: &["germany"],
    },
    MarketProfile {
        code: "fr",
        domain: "amazon.fr",
        currency: "EUR",
        accept_language: "fr-FR,fr;q=0.9,en;q=0.8",
        locale: "fr_FR",
        comma_decimal: true,
        aliases: &["france"],
    },
    MarketProfile {
        code: "es",
        domain: "amazon.es",
        currency: "EUR",
        accept_language: "es-ES,es;q=0.9,en;q=0.8",
        locale: "es_ES",
        comma_decimal: true,
        aliases: &["spain"],
    },
    MarketProfile {
        code: "it",
        domain: "amazon.it",
        currency: "EUR",
        accept_language: "it-IT,it;q=0.9,en;q=0.8",
        locale: "it_IT",
        comma_decimal: true,
        aliases: &["italy"],
    },
    MarketProfile {
        code: "ca",
        domain: "amazon.ca",
        currency: "CAD",
        accept_language: "en-CA,en;q=0.9,fr;q=0.7",
        locale: "en_CA",
        comma_decimal: false,
        aliases: &["canada"],
    },
    MarketProfile {
        code: "au",
        domain: "amazon.com.au",
        currency: "AUD",
        accept_language: "en-AU,en;q=0.9",
        locale: "en_AU",
        comma_decimal: false,
        aliases: &["australia"],
    },
    MarketProfile {
        code: "jp",
        domain: "amazon.co.jp",
        currency: "JPY",
        accept_language: "ja-JP,ja;q=0.9,en;q=0.8",
        locale: "ja_JP",
        comma_decimal: false,
        aliases: &["japan"],
    },
    MarketProfile {
        code: "in",
        domain: "amazon.in",
        currency: "INR",
        accept_language: "en-IN,en;q=0.9,hi;q=0.8",
        locale: "en_IN",
        comma_decimal: false,
        aliases: &["india"],
    },
    MarketProfile {
        code: "br",
        domain: "amazon.com.br",
        currency: "BRL",
        accept_language: "pt-BR,pt;q=0.9,en;q=0.8",
        locale: "pt_BR",
        comma_decimal: true,
        aliases: &["brazil"],
    },
    MarketProfile {
        code: "mx",
        domain: "amazon.com.mx",
        currency: "MXN",
        accept_language: "es-MX,es;q=0.9,en;q=0.8",
        locale: "es_MX",
        comma_decimal: false,
        aliases: &["mexico"],
    },
    MarketProfile {
        code: "nl",
        domain: "amazon.nl",
        currency: "EUR",
        accept_language: "nl-NL,nl;q=0.9,en;q=0.8",
        locale: "nl_NL",
        comma_decimal: true,
        aliases: &["netherlands"],
    },
    MarketProfile {
        code: "se",
        domain: "amazon.se",
        currency: "SEK",
        accept_language: "sv-SE,sv;q=0.9,en;q=0.8",
        locale: "sv_SE",
        comma_decimal: true,
        aliases: &["sweden"],
    },
    MarketProfile {
        code: "pl",
        domain: "amazon.pl",
        currency: "PLN",
        accept_language: "pl-PL,pl;q=0.9,en;q=0.8",
        locale: "pl_PL",
        comma_decimal: true,
        aliases: &["poland"],
    },
];

/// A target Amazon marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[default]
    Us,
    Uk,
    De,
    Fr,
    Es,
    It,
    Ca,
    Au,
    Jp,
    In,
    Br,
    Mx,
    Nl,
    Se,
    Pl,
}

impl Market {
    const ALL: [Market; 15] = [
        Market::Us,
        Market::Uk,
        Market::De,
        Market::Fr,
        Market::Es,
        Market::It,
        Market::Ca,
        Market::Au,
        Market::Jp,
        Market::In,
        Market::Br,
        Market::Mx,
        Market::Nl,
        Market::Se,
        Market::Pl,
    ];

    /// Returns every supported marketplace.
    pub fn all() -> &'static [Market] {
        &Self::ALL
    }

    pub fn profile(&self) -> &'static MarketProfile {
        // ALL and PROFILES share the enum's declaration order.
        &PROFILES[*self as usize]
    }

    pub fn domain(&self) -> &'static str {
        self.profile().domain
    }

    /// Returns the storefront origin, e.g. `https://www.amazon.de`.
    pub fn base_url(&self) -> String {
        format!("https://www.{}", self.domain())
    }

    pub fn currency(&self) -> &'static str {
        self.profile().currency
    }

    pub fn accept_language(&self) -> &'static str {
        self.profile().accept_language
    }

    /// Whether prices are written `1.234,56` rather than `1,234.56`.
    pub fn uses_comma_decimal(&self) -> bool {
        self.profile().comma_decimal
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().code)
    }
}

impl FromStr for Market {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Market::all()
            .iter()
            .copied()
            .find(|m| {
                let p = m.profile();
                p.code == wanted || p.aliases.contains(&wanted.as_str())
            })
            .ok_or_else(|| MarketParseError(s.to_string()))
    }
}

#[derive(Debug, Clone, Error)]
#[error("Unknown market '{0}'. Valid markets: us, uk, de, fr, es, it, ca, au, jp, in, br, mx, nl, se, pl")]
pub struct MarketParseError(String);

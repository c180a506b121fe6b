//! Synthetic fixture data.
//!
//! A [`Faker`] is a seedable generator grouped into providers, mirroring the
//! usual locale provider set: base, date/time, lorem, internet, payment and
//! the `en_US` person, address, phone number and company providers. Calling a
//! formatter whose provider is not registered is an error.

use std::{
    collections::BTreeSet,
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng as _, rngs::StdRng, seq::IndexedRandom as _};

use crate::app::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Provider {
    Base,
    DateTime,
    Lorem,
    Internet,
    Payment,
    Person,
    Address,
    PhoneNumber,
    Company,
}

pub const DEFAULT_PROVIDERS: [Provider; 9] = [
    Provider::Base,
    Provider::DateTime,
    Provider::Lorem,
    Provider::Internet,
    Provider::Payment,
    Provider::Person,
    Provider::Address,
    Provider::PhoneNumber,
    Provider::Company,
];

#[derive(Debug, thiserror::Error)]
pub enum FakerError {
    #[error("Unknown formatter '{formatter}': {provider:?} provider is not registered")]
    UnknownFormatter {
        formatter: &'static str,
        provider: Provider,
    },
    #[error("Invalid range for '{formatter}'")]
    InvalidRange { formatter: &'static str },
}

const LOREM_WORDS: &[&str] = &[
    "alias", "consequatur", "aut", "perferendis", "sit", "voluptatem", "accusantium", "doloremque",
    "aperiam", "eaque", "ipsa", "quae", "ab", "illo", "inventore", "veritatis", "et", "quasi",
    "architecto", "beatae", "vitae", "dicta", "sunt", "explicabo", "nemo", "enim", "ipsam",
    "quia", "voluptas", "aspernatur", "odit", "fugit", "sed", "consequuntur", "magni", "dolores",
    "eos", "qui", "ratione", "sequi", "nesciunt", "neque", "dolorem", "ipsum", "dolor", "amet",
    "consectetur", "adipisci", "velit", "numquam", "eius", "modi", "tempora", "incidunt", "ut",
    "labore", "dolore", "magnam", "aliquam", "quaerat",
];

const FIRST_NAMES: &[&str] = &[
    "Aaron", "Abigail", "Adam", "Alice", "Amelia", "Benjamin", "Brooke", "Caleb", "Chloe",
    "Daniel", "Delia", "Elijah", "Emma", "Felix", "Grace", "Henry", "Isla", "Jack", "Julia",
    "Liam", "Lucy", "Mason", "Mia", "Noah", "Olivia", "Owen", "Ruby", "Samuel", "Sofia", "Zoe",
];

const LAST_NAMES: &[&str] = &[
    "Anderson", "Baker", "Brown", "Carter", "Clark", "Davis", "Evans", "Garcia", "Hall",
    "Harris", "Jackson", "Johnson", "King", "Lee", "Lewis", "Martin", "Miller", "Moore",
    "Nelson", "Parker", "Robinson", "Smith", "Taylor", "Thomas", "Walker", "White", "Wilson",
];

const TITLES: &[&str] = &["Mr.", "Mrs.", "Ms.", "Miss", "Dr.", "Prof."];

const STREET_SUFFIXES: &[&str] = &[
    "Avenue", "Boulevard", "Court", "Drive", "Lane", "Place", "Road", "Street", "Way",
];

const CITY_PREFIXES: &[&str] = &["North", "South", "East", "West", "New", "Lake", "Port"];

const CITY_SUFFIXES: &[&str] = &["town", "ton", "land", "ville", "berg", "burgh", "port", "view"];

const STATE_ABBRS: &[&str] = &[
    "AK", "AL", "AZ", "CA", "CO", "CT", "FL", "GA", "IA", "IL", "MA", "MD", "MI", "MN", "NC",
    "NJ", "NY", "OH", "OR", "PA", "TX", "VA", "WA", "WI",
];

const COUNTRIES: &[&str] = &[
    "Argentina", "Australia", "Brazil", "Canada", "Denmark", "France", "Germany", "India",
    "Ireland", "Japan", "Kenya", "Mexico", "Norway", "Portugal", "Spain", "Sweden",
];

const PHONE_FORMATS: &[&str] = &[
    "###-###-####",
    "(###) ###-####",
    "1-###-###-####",
    "###.###.####",
    "+1 (###) ###-####",
];

const FREE_EMAIL_DOMAINS: &[&str] = &["gmail.com", "yahoo.com", "hotmail.com"];

const SAFE_EMAIL_DOMAINS: &[&str] = &["example.com", "example.org", "example.net"];

const TLDS: &[&str] = &["com", "net", "org", "biz", "info"];

const COMPANY_SUFFIXES: &[&str] = &["Inc", "and Sons", "LLC", "Group", "PLC", "Ltd"];

const CATCH_PHRASE_WORDS: [&[&str]; 3] = [
    &["Adaptive", "Automated", "Balanced", "Centralized", "Distributed", "Focused", "Robust"],
    &["24/7", "bottom-line", "dynamic", "empowering", "holistic", "modular", "scalable"],
    &["architecture", "framework", "hierarchy", "middleware", "paradigm", "solution", "toolset"],
];

const BS_WORDS: [&[&str]; 3] = [
    &["aggregate", "deploy", "empower", "integrate", "leverage", "streamline", "synergize"],
    &["B2B", "best-of-breed", "cross-platform", "end-to-end", "real-time", "seamless", "viral"],
    &["channels", "communities", "deliverables", "markets", "platforms", "solutions", "synergies"],
];

/// `(card type, prefixes, length)`
const CARD_TYPES: &[(&str, &[&str], usize)] = &[
    ("Visa", &["4"], 16),
    ("MasterCard", &["51", "52", "53", "54", "55"], 16),
    ("American Express", &["34", "37"], 15),
    ("Discover Card", &["6011"], 16),
];

/// Compute the Luhn check digit for `digits`.
fn luhn_check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    // `(10 - sum % 10) % 10` is always a single digit
    u8::try_from((10 - sum % 10) % 10).unwrap_or_default()
}

/// Whether `number` (digits only) passes the Luhn checksum.
#[must_use]
pub fn luhn_valid(number: &str) -> bool {
    let Some(digits) = number
        .chars()
        .map(|c| c.to_digit(10).and_then(|d| u8::try_from(d).ok()))
        .collect::<Option<Vec<_>>>()
    else {
        return false;
    };

    match digits.split_last() {
        Some((&check, rest)) if !rest.is_empty() => luhn_check_digit(rest) == check,
        _ => false,
    }
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn digit_char(rng: &mut StdRng) -> char {
    char::from(b'0' + rng.random_range(0..10_u8))
}

fn letter_char(rng: &mut StdRng) -> char {
    char::from(b'a' + rng.random_range(0..26_u8))
}

fn numerify(rng: &mut StdRng, format: &str) -> String {
    format
        .chars()
        .map(|c| if c == '#' { digit_char(rng) } else { c })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

fn words(rng: &mut StdRng, count: usize) -> Vec<&'static str> {
    (0..count).map(|_| pick(rng, LOREM_WORDS)).collect()
}

fn sentence(rng: &mut StdRng, word_count: usize) -> String {
    format!("{}.", capitalize(&words(rng, word_count.max(1)).join(" ")))
}

/// Seedable fixture data generator.
#[derive(Debug)]
pub struct Faker {
    providers: BTreeSet<Provider>,
    rng: Mutex<StdRng>,
}

impl Default for Faker {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Faker {
    /// A generator with every default provider. The same `seed` always yields
    /// the same sequence of values.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let mut faker = Self::empty(seed);
        for provider in DEFAULT_PROVIDERS {
            faker.add_provider(provider);
        }
        faker
    }

    /// A generator without providers.
    #[must_use]
    pub fn empty(seed: Option<u64>) -> Self {
        Self {
            providers: BTreeSet::new(),
            rng: Mutex::new(seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)),
        }
    }

    pub fn add_provider(&mut self, provider: Provider) -> &mut Self {
        self.providers.insert(provider);
        self
    }

    #[must_use]
    pub fn has_provider(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.providers.iter().copied()
    }

    fn format<T>(
        &self,
        formatter: &'static str,
        provider: Provider,
        f: impl FnOnce(&mut StdRng) -> T,
    ) -> Result<T, FakerError> {
        if !self.has_provider(provider) {
            return Err(FakerError::UnknownFormatter {
                formatter,
                provider,
            });
        }
        Ok(f(&mut lock(&self.rng)))
    }

    // base

    /// # Errors
    ///
    /// * If the base provider is not registered
    pub fn random_digit(&self) -> Result<u8, FakerError> {
        self.format("random_digit", Provider::Base, |rng| rng.random_range(0..10))
    }

    /// A number in `[min, max]`.
    ///
    /// # Errors
    ///
    /// * If the base provider is not registered
    /// * If `min > max`
    pub fn number_between(&self, min: i64, max: i64) -> Result<i64, FakerError> {
        if min > max {
            return Err(FakerError::InvalidRange {
                formatter: "number_between",
            });
        }
        self.format("number_between", Provider::Base, |rng| {
            rng.random_range(min..=max)
        })
    }

    /// `true` with the given percentage chance.
    ///
    /// # Errors
    ///
    /// * If the base provider is not registered
    pub fn boolean(&self, chance_of_true: u8) -> Result<bool, FakerError> {
        self.format("boolean", Provider::Base, |rng| {
            rng.random_range(0..100) < chance_of_true
        })
    }

    /// Replace every `#` with a random digit.
    ///
    /// # Errors
    ///
    /// * If the base provider is not registered
    pub fn numerify(&self, format: &str) -> Result<String, FakerError> {
        self.format("numerify", Provider::Base, |rng| numerify(rng, format))
    }

    /// Replace every `?` with a random lowercase letter.
    ///
    /// # Errors
    ///
    /// * If the base provider is not registered
    pub fn lexify(&self, format: &str) -> Result<String, FakerError> {
        self.format("lexify", Provider::Base, |rng| {
            format
                .chars()
                .map(|c| if c == '?' { letter_char(rng) } else { c })
                .collect()
        })
    }

    /// # Errors
    ///
    /// * If the base provider is not registered
    pub fn random_element<'a, T>(&self, values: &'a [T]) -> Result<Option<&'a T>, FakerError> {
        self.format("random_element", Provider::Base, |rng| values.choose(rng))
    }

    // date/time

    /// A timestamp between `start` and `end`, inclusive.
    ///
    /// # Errors
    ///
    /// * If the date/time provider is not registered
    /// * If `start` is after `end`
    pub fn date_time_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, FakerError> {
        let invalid = || FakerError::InvalidRange {
            formatter: "date_time_between",
        };
        if start > end {
            return Err(invalid());
        }
        let secs = self.format("date_time_between", Provider::DateTime, |rng| {
            rng.random_range(start.timestamp()..=end.timestamp())
        })?;
        DateTime::from_timestamp(secs, 0).ok_or_else(invalid)
    }

    /// A timestamp between the Unix epoch and now.
    ///
    /// # Errors
    ///
    /// * If the date/time provider is not registered
    pub fn date_time(&self) -> Result<DateTime<Utc>, FakerError> {
        self.date_time_between(DateTime::UNIX_EPOCH, Utc::now())
    }

    /// A date formatted with a `chrono` format string, e.g. `%Y-%m-%d`.
    ///
    /// # Errors
    ///
    /// * If the date/time provider is not registered
    pub fn date(&self, format: &str) -> Result<String, FakerError> {
        Ok(self.date_time()?.format(format).to_string())
    }

    /// # Errors
    ///
    /// * If the date/time provider is not registered
    pub fn unix_time(&self) -> Result<i64, FakerError> {
        Ok(self.date_time()?.timestamp())
    }

    // lorem

    /// # Errors
    ///
    /// * If the lorem provider is not registered
    pub fn word(&self) -> Result<&'static str, FakerError> {
        self.format("word", Provider::Lorem, |rng| pick(rng, LOREM_WORDS))
    }

    /// # Errors
    ///
    /// * If the lorem provider is not registered
    pub fn words(&self, count: usize) -> Result<Vec<&'static str>, FakerError> {
        self.format("words", Provider::Lorem, |rng| words(rng, count))
    }

    /// # Errors
    ///
    /// * If the lorem provider is not registered
    pub fn sentence(&self, word_count: usize) -> Result<String, FakerError> {
        self.format("sentence", Provider::Lorem, |rng| sentence(rng, word_count))
    }

    /// # Errors
    ///
    /// * If the lorem provider is not registered
    pub fn paragraph(&self, sentence_count: usize) -> Result<String, FakerError> {
        self.format("paragraph", Provider::Lorem, |rng| {
            (0..sentence_count.max(1))
                .map(|_| {
                    let word_count = rng.random_range(4..=10);
                    sentence(rng, word_count)
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// Sentences up to `max_chars` characters.
    ///
    /// # Errors
    ///
    /// * If the lorem provider is not registered
    pub fn text(&self, max_chars: usize) -> Result<String, FakerError> {
        self.format("text", Provider::Lorem, |rng| {
            let mut text = String::new();
            loop {
                let word_count = rng.random_range(4..=10);
                let next = sentence(rng, word_count);
                let sep = usize::from(!text.is_empty());
                if text.len() + sep + next.len() > max_chars {
                    break;
                }
                if sep == 1 {
                    text.push(' ');
                }
                text.push_str(&next);
            }
            text
        })
    }

    // internet

    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn user_name(&self) -> Result<String, FakerError> {
        self.format("user_name", Provider::Internet, |rng| {
            let first = pick(rng, FIRST_NAMES).to_lowercase();
            let last = pick(rng, LAST_NAMES).to_lowercase();
            match rng.random_range(0..3) {
                0 => format!("{first}.{last}"),
                1 => format!("{}{last}", &first[..1]),
                _ => format!("{first}{}", numerify(rng, "##")),
            }
        })
    }

    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn domain_name(&self) -> Result<String, FakerError> {
        self.format("domain_name", Provider::Internet, |rng| {
            format!(
                "{}.{}",
                pick(rng, LAST_NAMES).to_lowercase(),
                pick(rng, TLDS)
            )
        })
    }

    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn email(&self) -> Result<String, FakerError> {
        let user = self.user_name()?;
        self.format("email", Provider::Internet, |rng| {
            format!("{user}@{}", pick(rng, FREE_EMAIL_DOMAINS))
        })
    }

    /// An address on a reserved example domain.
    ///
    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn safe_email(&self) -> Result<String, FakerError> {
        let user = self.user_name()?;
        self.format("safe_email", Provider::Internet, |rng| {
            format!("{user}@{}", pick(rng, SAFE_EMAIL_DOMAINS))
        })
    }

    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn url(&self) -> Result<String, FakerError> {
        let domain = self.domain_name()?;
        let slug = self.slug()?;
        Ok(format!("https://www.{domain}/{slug}"))
    }

    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn slug(&self) -> Result<String, FakerError> {
        self.format("slug", Provider::Internet, |rng| {
            let count = rng.random_range(2..=4);
            words(rng, count).join("-")
        })
    }

    /// # Errors
    ///
    /// * If the internet provider is not registered
    pub fn ipv4(&self) -> Result<String, FakerError> {
        self.format("ipv4", Provider::Internet, |rng| {
            let octets: [u8; 4] = rng.random();
            std::net::Ipv4Addr::from(octets).to_string()
        })
    }

    // payment

    /// # Errors
    ///
    /// * If the payment provider is not registered
    pub fn credit_card_type(&self) -> Result<&'static str, FakerError> {
        self.format("credit_card_type", Provider::Payment, |rng| {
            CARD_TYPES.choose(rng).map_or("Visa", |(name, _, _)| *name)
        })
    }

    /// A Luhn-valid card number.
    ///
    /// # Errors
    ///
    /// * If the payment provider is not registered
    pub fn credit_card_number(&self) -> Result<String, FakerError> {
        self.format("credit_card_number", Provider::Payment, |rng| {
            let (_, prefixes, length) = CARD_TYPES.choose(rng).copied().unwrap_or(CARD_TYPES[0]);
            let prefix = pick(rng, prefixes);

            let mut digits = prefix.bytes().map(|b| b - b'0').collect::<Vec<_>>();
            while digits.len() < length - 1 {
                digits.push(rng.random_range(0..10));
            }
            digits.push(luhn_check_digit(&digits));

            digits.iter().map(|d| char::from(b'0' + d)).collect()
        })
    }

    /// Expiration date within the next five years, as `MM/YY`.
    ///
    /// # Errors
    ///
    /// * If the payment provider is not registered
    pub fn credit_card_expiration_date(&self) -> Result<String, FakerError> {
        let now = Utc::now();
        let end = now + chrono::Duration::days(365 * 5);
        let secs = self.format("credit_card_expiration_date", Provider::Payment, |rng| {
            rng.random_range(now.timestamp()..=end.timestamp())
        })?;
        Ok(DateTime::from_timestamp(secs, 0)
            .unwrap_or(now)
            .format("%m/%y")
            .to_string())
    }

    // person

    /// # Errors
    ///
    /// * If the person provider is not registered
    pub fn first_name(&self) -> Result<&'static str, FakerError> {
        self.format("first_name", Provider::Person, |rng| pick(rng, FIRST_NAMES))
    }

    /// # Errors
    ///
    /// * If the person provider is not registered
    pub fn last_name(&self) -> Result<&'static str, FakerError> {
        self.format("last_name", Provider::Person, |rng| pick(rng, LAST_NAMES))
    }

    /// # Errors
    ///
    /// * If the person provider is not registered
    pub fn title(&self) -> Result<&'static str, FakerError> {
        self.format("title", Provider::Person, |rng| pick(rng, TITLES))
    }

    /// # Errors
    ///
    /// * If the person provider is not registered
    pub fn name(&self) -> Result<String, FakerError> {
        Ok(format!("{} {}", self.first_name()?, self.last_name()?))
    }

    // address

    /// # Errors
    ///
    /// * If the address provider is not registered
    pub fn street_address(&self) -> Result<String, FakerError> {
        self.format("street_address", Provider::Address, |rng| {
            format!(
                "{} {} {}",
                rng.random_range(1..=9999),
                pick(rng, LAST_NAMES),
                pick(rng, STREET_SUFFIXES)
            )
        })
    }

    /// # Errors
    ///
    /// * If the address provider is not registered
    pub fn city(&self) -> Result<String, FakerError> {
        self.format("city", Provider::Address, |rng| {
            format!(
                "{} {}{}",
                pick(rng, CITY_PREFIXES),
                pick(rng, FIRST_NAMES),
                pick(rng, CITY_SUFFIXES)
            )
        })
    }

    /// # Errors
    ///
    /// * If the address provider is not registered
    pub fn state_abbr(&self) -> Result<&'static str, FakerError> {
        self.format("state_abbr", Provider::Address, |rng| pick(rng, STATE_ABBRS))
    }

    /// # Errors
    ///
    /// * If the address provider is not registered
    pub fn postcode(&self) -> Result<String, FakerError> {
        self.format("postcode", Provider::Address, |rng| numerify(rng, "#####"))
    }

    /// # Errors
    ///
    /// * If the address provider is not registered
    pub fn country(&self) -> Result<&'static str, FakerError> {
        self.format("country", Provider::Address, |rng| pick(rng, COUNTRIES))
    }

    /// # Errors
    ///
    /// * If the address provider is not registered
    pub fn address(&self) -> Result<String, FakerError> {
        Ok(format!(
            "{}\n{}, {} {}",
            self.street_address()?,
            self.city()?,
            self.state_abbr()?,
            self.postcode()?
        ))
    }

    // phone number

    /// # Errors
    ///
    /// * If the phone number provider is not registered
    pub fn phone_number(&self) -> Result<String, FakerError> {
        self.format("phone_number", Provider::PhoneNumber, |rng| {
            let format = pick(rng, PHONE_FORMATS);
            numerify(rng, format)
        })
    }

    // company

    /// # Errors
    ///
    /// * If the company provider is not registered
    pub fn company(&self) -> Result<String, FakerError> {
        self.format("company", Provider::Company, |rng| {
            match rng.random_range(0..3) {
                0 => format!("{} {}", pick(rng, LAST_NAMES), pick(rng, COMPANY_SUFFIXES)),
                1 => format!("{}-{}", pick(rng, LAST_NAMES), pick(rng, LAST_NAMES)),
                _ => format!(
                    "{}, {} and {}",
                    pick(rng, LAST_NAMES),
                    pick(rng, LAST_NAMES),
                    pick(rng, LAST_NAMES)
                ),
            }
        })
    }

    /// # Errors
    ///
    /// * If the company provider is not registered
    pub fn company_suffix(&self) -> Result<&'static str, FakerError> {
        self.format("company_suffix", Provider::Company, |rng| {
            pick(rng, COMPANY_SUFFIXES)
        })
    }

    /// # Errors
    ///
    /// * If the company provider is not registered
    pub fn catch_phrase(&self) -> Result<String, FakerError> {
        self.format("catch_phrase", Provider::Company, |rng| {
            CATCH_PHRASE_WORDS
                .iter()
                .map(|set| pick(rng, set))
                .collect::<Vec<_>>()
                .join(" ")
        })
    }

    /// # Errors
    ///
    /// * If the company provider is not registered
    pub fn bs(&self) -> Result<String, FakerError> {
        self.format("bs", Provider::Company, |rng| {
            BS_WORDS
                .iter()
                .map(|set| pick(rng, set))
                .collect::<Vec<_>>()
                .join(" ")
        })
    }
}

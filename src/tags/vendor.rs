//! Vendor classification of captured network calls
//!
//! Each vendor is an entry in the rule table: a signature pattern and a
//! field parser. Rules are tested in table order and the LAST rule whose
//! signature matches decides the vendor kind and supplies the fields:
//!
//! 1. Floodlight activity ping
//! 2. Analytics collector call
//! 3. Ads remarketing ping
//! 4. Ads conversion ping
//!
//! Fields are pulled from fixed `key=value` captures anywhere in the URL. An
//! empty capture counts as absent.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// The vendor a tracking call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VendorKind {
    Floodlight,
    Analytics,
    AdsRemarketing,
    AdsConversion,
}

impl VendorKind {
    /// Label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Floodlight => "Floodlight",
            Self::Analytics => "Google Analytics",
            Self::AdsRemarketing => "Google Ads Remarketing",
            Self::AdsConversion => "Google Ads Conversion",
        }
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields extracted from one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFields {
    /// Advertiser (Floodlight `src`, analytics `tid`, Ads conversion ID)
    pub advertiser: Option<String>,

    /// Floodlight activity tag string (`cat`)
    pub activity: Option<String>,

    /// Floodlight activity group tag string (`type`)
    pub group: Option<String>,

    /// Floodlight click cookie (`gcldc`)
    pub floodlight_cookie: Option<String>,

    /// Ads click cookie (`gclaw`)
    pub ads_cookie: Option<String>,

    pub auiddc: Option<String>,

    /// Custom variables as decoded `uN=value` pairs, in URL order
    pub uvars: Vec<String>,

    /// Sales order (`ord`)
    pub order: Option<String>,

    /// Analytics hit type (`t`)
    pub hit_type: Option<String>,

    /// The call is a redirect hop (`dc_pre`)
    pub redirect: bool,
}

/// The outcome of classifying one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: VendorKind,
    pub fields: TagFields,

    /// The call was sent by an event snippet (`gtm=` present)
    pub event_snippet: bool,
}

struct VendorRule {
    kind: VendorKind,
    signature: Regex,
    parse: fn(&str) -> TagFields,
}

static VENDOR_RULES: LazyLock<Vec<VendorRule>> = LazyLock::new(|| {
    vec![
        VendorRule {
            kind: VendorKind::Floodlight,
            signature: Regex::new(r"doubleclick\.net.*/activity").unwrap(),
            parse: parse_floodlight,
        },
        VendorRule {
            kind: VendorKind::Analytics,
            signature: Regex::new(r"google-analytics\.com/|stats\.g\.doubleclick\.net/r/collect")
                .unwrap(),
            parse: parse_analytics,
        },
        VendorRule {
            kind: VendorKind::AdsRemarketing,
            signature: Regex::new(r"g\.doubleclick\.net/pagead/viewthroughconversion").unwrap(),
            parse: parse_remarketing,
        },
        VendorRule {
            kind: VendorKind::AdsConversion,
            signature: Regex::new(r"googleadservices\.com/pagead/conversion").unwrap(),
            parse: parse_conversion,
        },
    ]
});

macro_rules! field_pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($re).unwrap());
    };
}

field_pattern!(SRC, r"src=(\w*)");
field_pattern!(CAT, r"cat=(\w*)");
field_pattern!(TYPE, r"type=(\w*)");
field_pattern!(GCLDC, r"gcldc=([\w\-*]+)");
field_pattern!(GCLAW, r"gclaw=([\w\-*]+)");
field_pattern!(AUIDDC, r"auiddc=([\w.]*)");
field_pattern!(UVAR, r"u[0-9]*=[^;]*");
field_pattern!(ORD, r"ord=([\d.]*)");
field_pattern!(DC_PRE, r"dc_pre=");
field_pattern!(TID, r"tid=(\w*(?:-\w*)*)");
field_pattern!(HIT_TYPE, r"[?&]t=(\w*)");
field_pattern!(REMARKETING_ID, r"pagead/viewthroughconversion/(\w*)");
field_pattern!(CONVERSION_ID, r"pagead/conversion/(\w*)");
field_pattern!(EVENT_SNIPPET, r"gtm=\w*");

/// First capture group of `pattern` in `url`, if present and non-empty
fn capture(pattern: &Regex, url: &str) -> Option<String> {
    pattern
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn parse_floodlight(url: &str) -> TagFields {
    TagFields {
        advertiser: capture(&SRC, url),
        activity: capture(&CAT, url),
        group: capture(&TYPE, url),
        floodlight_cookie: capture(&GCLDC, url),
        ads_cookie: capture(&GCLAW, url),
        auiddc: capture(&AUIDDC, url),
        uvars: UVAR.find_iter(url).map(|m| decode(m.as_str())).collect(),
        order: capture(&ORD, url),
        redirect: DC_PRE.is_match(url),
        ..TagFields::default()
    }
}

fn parse_analytics(url: &str) -> TagFields {
    TagFields {
        advertiser: capture(&TID, url),
        hit_type: capture(&HIT_TYPE, url),
        ..TagFields::default()
    }
}

fn parse_remarketing(url: &str) -> TagFields {
    TagFields {
        advertiser: capture(&REMARKETING_ID, url),
        ..TagFields::default()
    }
}

fn parse_conversion(url: &str) -> TagFields {
    TagFields {
        advertiser: capture(&CONVERSION_ID, url),
        ..TagFields::default()
    }
}

/// Classifies a call URL, or returns `None` if no vendor signature matches
///
/// # Examples
///
/// ```
/// use tagwalk::tags::{classify, VendorKind};
///
/// let c = classify("https://123.fls.doubleclick.net/activityi;src=123;type=sales;cat=buy;ord=1").unwrap();
/// assert_eq!(c.kind, VendorKind::Floodlight);
/// assert_eq!(c.fields.activity.as_deref(), Some("buy"));
/// ```
pub fn classify(url: &str) -> Option<Classification> {
    let rule = VENDOR_RULES
        .iter()
        .filter(|rule| rule.signature.is_match(url))
        .last()?;

    Some(Classification {
        kind: rule.kind,
        fields: (rule.parse)(url),
        event_snippet: EVENT_SNIPPET.is_match(url),
    })
}

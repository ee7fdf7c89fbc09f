//! Tag extractor: turns captured network calls into tracker records

use super::record::{ObservedCall, RecordKeyStrategy, TagRecord};
use super::resolver::FloodlightQuery;
use super::tracker::{RecordRef, TagTracker, TrackOutcome};
use super::vendor::{classify, VendorKind};
use super::warnings::floodlight_warnings;
use crate::url::{DomainScope, PageKey};

/// What happened to one captured call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The originating page is not on the target domain
    OutOfScope,

    /// No vendor signature matched
    Unclassified,

    /// Floodlight call for an advertiser outside the configured allow-list
    Filtered,

    /// Redirect hop; never recorded
    Redirect,

    /// A new record was stored
    Created(RecordRef),

    /// The call was appended to an existing record
    Appended(RecordRef),
}

impl Extraction {
    /// The record a call landed in, if any
    pub fn record(&self) -> Option<&RecordRef> {
        match self {
            Self::Created(r) | Self::Appended(r) => Some(r),
            _ => None,
        }
    }
}

/// Classifies calls and files them in a [`TagTracker`]
#[derive(Debug, Clone)]
pub struct TagExtractor {
    scope: DomainScope,
    config_ids: Vec<String>,
    key_strategy: RecordKeyStrategy,
    profile_id: Option<String>,
}

impl TagExtractor {
    pub fn new(scope: DomainScope) -> Self {
        Self {
            scope,
            config_ids: Vec::new(),
            key_strategy: RecordKeyStrategy::default(),
            profile_id: None,
        }
    }

    /// Only keep Floodlight calls for these advertisers; empty keeps all
    pub fn with_config_ids(mut self, ids: Vec<String>) -> Self {
        self.config_ids = ids;
        self
    }

    pub fn with_key_strategy(mut self, strategy: RecordKeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    /// Enables floodlight ID lookups for this profile
    pub fn with_profile_id(mut self, profile_id: Option<String>) -> Self {
        self.profile_id = profile_id.filter(|p| !p.trim().is_empty());
        self
    }

    /// Processes one captured call made while `page_url` was loaded
    ///
    /// # Processing Steps
    ///
    /// 1. Drop the call if the page is not on the target domain
    /// 2. Classify by vendor; unclassified calls are dropped
    /// 3. Drop Floodlight calls outside the advertiser allow-list
    /// 4. Drop redirect hops
    /// 5. Build the record (with warnings for Floodlight) and file it under
    ///    the key the configured strategy derives
    pub fn extract(
        &self,
        tracker: &mut TagTracker,
        page_url: &str,
        call_url: &str,
        status_code: u16,
    ) -> Extraction {
        if !self.scope.contains(page_url) {
            return Extraction::OutOfScope;
        }

        let Some(classification) = classify(call_url) else {
            tracing::debug!("Unclassified call {}", call_url);
            return Extraction::Unclassified;
        };

        let kind = classification.kind;
        let fields = classification.fields;

        if kind == VendorKind::Floodlight && !self.config_ids.is_empty() {
            let allowed = fields
                .advertiser
                .as_ref()
                .map(|a| self.config_ids.contains(a))
                .unwrap_or(false);
            if !allowed {
                return Extraction::Filtered;
            }
        }

        if fields.redirect {
            tracing::debug!("Ignoring redirect call {}", call_url);
            return Extraction::Redirect;
        }

        let page = PageKey::new(page_url);
        let call = ObservedCall {
            url: call_url.to_string(),
            status_code,
        };
        let mut record = TagRecord::observed(
            &page,
            kind,
            fields,
            classification.event_snippet,
            call,
        );
        if kind == VendorKind::Floodlight {
            record.warnings = floodlight_warnings(&record.fields, classification.event_snippet);
        }

        let key = self.key_strategy.key_for(&record.id, kind, &record.fields);
        match tracker.track(page, key, record) {
            TrackOutcome::Created(location) => Extraction::Created(location),
            TrackOutcome::Appended(location) => Extraction::Appended(location),
        }
    }

    /// The floodlight ID lookup to run for `record`, if any
    ///
    /// Lookups need a configured profile, a Floodlight record with an
    /// advertiser, and no ID resolved yet.
    pub fn lookup_for(&self, record: &TagRecord) -> Option<FloodlightQuery> {
        let profile_id = self.profile_id.as_ref()?;
        if !record.is_floodlight() || record.floodlight_id.is_some() {
            return None;
        }

        Some(FloodlightQuery {
            advertiser: record.fields.advertiser.clone()?,
            activity: record.fields.activity.clone(),
            group: record.fields.group.clone(),
            profile_id: profile_id.clone(),
        })
    }

    pub fn scope(&self) -> &DomainScope {
        &self.scope
    }
}

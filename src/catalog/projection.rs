use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

use crate::model::*;

/// Calendar dates an occurrence may start on, read in a fixed reference
/// offset. An empty set admits every occurrence.
#[derive(Debug, Clone)]
pub struct CandidateDates {
    dates: HashSet<NaiveDate>,
    offset: FixedOffset,
}

impl Default for CandidateDates {
    fn default() -> Self {
        Self::any()
    }
}

impl CandidateDates {
    pub fn any() -> Self {
        Self {
            dates: HashSet::new(),
            offset: utc(),
        }
    }

    pub fn new(dates: impl IntoIterator<Item = NaiveDate>, offset: FixedOffset) -> Self {
        Self {
            dates: dates.into_iter().collect(),
            offset,
        }
    }

    /// Candidate dates of a search, `None` meaning any date.
    pub fn from_search(dates: Option<&[NaiveDate]>, offset: FixedOffset) -> Self {
        Self::new(dates.unwrap_or_default().iter().copied(), offset)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn admits(&self, occurrence: &Occurrence) -> bool {
        self.is_unrestricted()
            || calendar_date(occurrence.start_time(), self.offset)
                .is_some_and(|d| self.dates.contains(&d))
    }
}

pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// Project an opportunity into its client view, keeping only eligible
/// occurrences in start order. Returns `None` when nothing is eligible,
/// which is how dateless and unmatched opportunities drop out of listings.
pub fn project(opportunity: &Opportunity, dates: &CandidateDates) -> Option<OpportunityView> {
    let mut eligible: Vec<&Occurrence> = opportunity
        .occurrences
        .iter()
        .filter(|o| dates.admits(o))
        .collect();
    if eligible.is_empty() {
        return None;
    }
    eligible.sort_by_key(|o| o.start_time());

    let org = &opportunity.organization;
    Some(OpportunityView {
        id: opportunity.id,
        name: opportunity.name.clone(),
        description: opportunity.description.clone(),
        address: opportunity.address.clone(),
        organization_name: org.name.clone(),
        organization_link: org.website_link.clone(),
        cause_name: org.cause.as_ref().map(|c| c.name.clone()),
        category_name: opportunity.category.name.clone(),
        community_name: opportunity.community.as_ref().map(|c| c.name.clone()),
        latitude: opportunity.location.latitude,
        longitude: opportunity.location.longitude,
        image_url: opportunity.image_url.clone(),
        opportunity_type: opportunity.opportunity_type,
        occurrence_views: eligible.into_iter().map(OccurrenceView::from).collect(),
    })
}

use std::collections::HashSet;

use ulid::Ulid;

use crate::model::{Opportunity, OpportunitySearch};

/// The approval gate alone: the rule for the unfiltered listing path.
pub fn is_listed(opportunity: &Opportunity) -> bool {
    opportunity.approved
}

/// `None` restricts nothing; `Some(set)` requires membership, and a missing
/// value never matches.
fn allows(filter: &Option<HashSet<Ulid>>, value: Option<Ulid>) -> bool {
    match filter {
        None => true,
        Some(ids) => value.is_some_and(|id| ids.contains(&id)),
    }
}

/// Build the search predicate. Every clause must hold, and the approval
/// gate applies even when the search restricts nothing else.
pub fn build_predicate(search: &OpportunitySearch) -> impl Fn(&Opportunity) -> bool + '_ {
    move |o: &Opportunity| {
        allows(&search.cause_ids, o.cause_id())
            && allows(&search.category_ids, Some(o.category.id))
            && allows(&search.organization_ids, Some(o.organization.id))
            && allows(&search.community_ids, o.community_id())
            && search.opportunity_type.matches(o.opportunity_type)
            && is_listed(o)
    }
}

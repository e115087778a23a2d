/// Max identifiers in any single search filter set.
pub const MAX_FILTER_IDS: usize = 1_000;

/// Max candidate dates in a search request.
pub const MAX_CANDIDATE_DATES: usize = 366;

/// Max raw search request size in bytes.
pub const MAX_SEARCH_BODY_BYTES: usize = 256 * 1024;

/// Max length of an opportunity name.
pub const MAX_NAME_LEN: usize = 256;

/// Max occurrences owned by one opportunity.
pub const MAX_OCCURRENCES_PER_OPPORTUNITY: usize = 10_000;

/// Rendered `GET /property` listing.
pub const PROPERTIES_KEY: &str = "properties";

/// Keys whose payload embeds user rows (the listing joins owner name and email).
pub const USER_DEPENDENT_KEYS: &[&str] = &[PROPERTIES_KEY];

/// Keys whose payload embeds property rows.
pub const PROPERTY_DEPENDENT_KEYS: &[&str] = &[PROPERTIES_KEY];

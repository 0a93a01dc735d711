// Document workflow
pub mod documents;

// Line items and pricing
pub mod line_items;
pub mod money;
pub mod totals;

// Cross-document status derivation
pub mod status_propagator;

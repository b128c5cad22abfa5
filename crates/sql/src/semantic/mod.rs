//! Semantic passes over the analyzed expression tree
//!
//! These run between parsing and planning:
//! - `typing` infers result types for binary operations and decides the
//!   coercions to insert
//! - `coercion` implements cast insertion and constant cast folding
//! - `traversal` holds the uniform recursive passes (collection, search,
//!   GROUP BY validation, domain extraction)
//! - `predicate` splits WHERE trees into scan / join / constant buckets and
//!   canonicalizes simple comparisons
//! - `rewrite` re-targets expressions across plan boundaries

pub mod coercion;
pub mod predicate;
pub mod rewrite;
pub mod traversal;
pub mod typing;

pub use predicate::PredicateBuckets;

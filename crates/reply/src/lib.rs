//! Canned reply selection: the host-supplied catalog, the keyword rules that
//! classify user input, and the random source behind card picks.

pub mod catalog;
pub mod error;
pub mod random;
pub mod rules;

pub use catalog::{CANNED_REPLY_COUNT, Card, CardLink, DEFAULT_FALLBACK_REPLY, ReplyCatalog};
pub use error::{CatalogError, CatalogResult};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use rules::{ReplyDirective, ReplyRules};

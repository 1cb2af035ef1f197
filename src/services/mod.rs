//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Request identity and pacing (`IdentityPool`)
//! - Block classification (`BlockingDetector`) and session health (`SessionPolicy`)
//! - Listing page parsing (`ListingParser`)
//! - Field resolution (`FieldResolver`)
//! - Description cleaning (`DescriptionSanitizer`)
//! - Record assembly (`RecordAssembler`)

mod assembler;
mod blocking;
mod identity;
mod listing;
pub mod resolver;
mod sanitizer;
mod session;

pub use assembler::RecordAssembler;
pub use blocking::{BlockingDetector, Verdict};
pub use identity::{IdentityPool, RequestIdentity, jitter};
pub use listing::{DiscoveredJob, ListingParser, NextPage, NextVia};
pub use resolver::{ExtractionContext, FieldResolver, ResolvedFields};
pub use sanitizer::{ALLOWED_TAGS, Description, DescriptionSanitizer};
pub use session::{
    ProxyProvider, Session, SessionOutcome, SessionPolicy, SessionState, StaticProxyProvider,
};

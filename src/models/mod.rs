// Models module - certificate and account representations

pub mod account;
pub mod certificate;
pub mod metadata;

pub use account::{AccountId, ValidationError};
pub use certificate::{
    BlockNumber, MetadataEncodingError, RawCertificateRecord, ResolvedCertificate, Verdict,
};
pub use metadata::DecodedMetadata;

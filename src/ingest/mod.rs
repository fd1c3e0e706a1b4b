/// Catalog ingestion.
///
/// Parsers that turn external hazard model exports into catalog events.
/// Storage is left to the catalog gateway.

pub mod ruptures;

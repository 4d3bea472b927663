// src/edgar/mod.rs
pub mod client;
pub mod filing;
pub mod forms;
pub mod identifiers;
pub mod models;

#[allow(unused_imports)]
pub use client::{EdgarClient, FilingUrls};
#[allow(unused_imports)]
pub use filing::{Filing, FilingOptions, LocalCache, RemoteSource, Slot};
#[allow(unused_imports)]
pub use forms::{classify, FilingType, FormCategory};
#[allow(unused_imports)]
pub use identifiers::{Accession, FilingId, IdentifierPair};

pub mod cdn;

pub use cdn::CdnStorage;

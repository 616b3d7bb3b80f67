pub mod property;

pub use property::{PaymentMethod, Property, PropertyType, Source, TokenizationInfo};

#[cfg(test)]
pub use property::test_property;

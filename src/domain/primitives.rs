//! Domain identifiers: VendorId, ProductId, CategoryId, OrderId.

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

id_newtype! {
    /// Identifier of a vendor (seller) account.
    VendorId
}

id_newtype! {
    /// Identifier of a catalog product.
    ProductId
}

id_newtype! {
    /// Identifier of a catalog category.
    CategoryId
}

id_newtype! {
    /// Identifier of an order in the order subsystem.
    OrderId
}

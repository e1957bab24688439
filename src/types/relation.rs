use std::fmt;

/// The two uniqueness-constrained (user, recipe) relation sets. Both share one
/// store routine; the kind selects the backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Favorite,
    ShoppingCart,
}

impl RelationKind {
    /// Backing table name. Must stay in sync with the schema; never
    /// interpolates user input.
    pub(crate) const fn table(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
        }
    }

    /// Human name used in error messages ("already in favorites").
    pub const fn describe(self) -> &'static str {
        match self {
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping cart",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

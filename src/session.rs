//! Per-session context: the cart and the admin flag.
//!
//! One `Session` exists per browsing session, created on first access by the
//! caller, passed `&mut` into the handlers that need it, and discarded when
//! the session ends. Nothing here touches durable storage.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 50;

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Menu item id -> requested quantity. Setting a quantity replaces any
    /// prior value for that item.
    pub cart: BTreeMap<i64, u32>,
    /// Set by the admin gate; persists for the session only.
    pub admin: bool,
}

impl Session {
    pub fn new() -> Self {
        Session::default()
    }

    /// Set the requested quantity for a menu item, replacing any prior value.
    /// Quantities outside `[1, MAX_LINE_QUANTITY]` are rejected and nothing
    /// is stored.
    pub fn set_quantity(&mut self, item_id: i64, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(Error::Validation(
                "Quantity must be greater than 0".to_string(),
            ));
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(Error::Validation(format!(
                "Quantity must be at most {MAX_LINE_QUANTITY}"
            )));
        }
        self.cart.insert(item_id, quantity);
        Ok(())
    }

    /// Empty the cart (explicit reset or successful submission).
    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }

    pub fn cart_is_empty(&self) -> bool {
        self.cart.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_quantity_replaces_prior_value() {
        let mut session = Session::new();
        session.set_quantity(7, 2).unwrap();
        session.set_quantity(7, 5).unwrap();
        assert_eq!(session.cart.get(&7), Some(&5));
        assert_eq!(session.cart.len(), 1);
    }

    #[test]
    fn zero_quantity_is_rejected_and_not_stored() {
        let mut session = Session::new();
        let err = session.set_quantity(7, 0).expect_err("zero should fail");
        assert!(matches!(err, Error::Validation(_)));
        assert!(session.cart_is_empty());
    }

    #[test]
    fn quantity_above_cap_is_rejected() {
        let mut session = Session::new();
        let err = session
            .set_quantity(7, MAX_LINE_QUANTITY + 1)
            .expect_err("over cap should fail");
        assert!(matches!(err, Error::Validation(_)));
        assert!(session.cart_is_empty());
    }

    #[test]
    fn clear_cart_empties_the_mapping() {
        let mut session = Session::new();
        session.set_quantity(1, 1).unwrap();
        session.set_quantity(2, 3).unwrap();
        session.clear_cart();
        assert!(session.cart_is_empty());
    }
}

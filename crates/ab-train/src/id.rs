use slotmap::new_key_type;

new_key_type! {
    /// Handle of a unit in a [`Train`](crate::Train). Stale after the unit is removed.
    pub struct UnitId;
}

use crate::Error;
use crate::ast::Value;
use std::ops::Range;

/// Index of a cell in the [`Store`]
pub type Address = usize;

/// Append-only sequence of mutable value cells
///
/// Addresses are handed out in allocation order and stay valid for the lifetime of
/// the store; cells are never reclaimed.
#[derive(Debug, Default)]
pub struct Store {
    cells: Vec<Value>,
}

impl Store {
    pub fn new() -> Self {
        Store { cells: Vec::new() }
    }

    /// Append a new cell holding `value` and return its address.
    pub fn allocate(&mut self, value: Value) -> Address {
        let address = self.cells.len();
        tracing::trace!(address, %value, "allocate cell");
        self.cells.push(value);
        address
    }

    /// Allocate one cell per value, in order. The returned range covers the new cells.
    pub fn allocate_many<I>(&mut self, values: I) -> Range<Address>
    where
        I: IntoIterator<Item = Value>,
    {
        let start = self.cells.len();
        for value in values {
            self.allocate(value);
        }
        start..self.cells.len()
    }

    /// Read the current value of a cell.
    pub fn read(&self, address: Address) -> Result<Value, Error> {
        self.cells
            .get(address)
            .cloned()
            .ok_or(Error::IllegalAddress(address))
    }

    /// Overwrite a cell in place.
    ///
    /// Writing outside the allocated cells is ignored rather than reported: only
    /// reads fail on an illegal address. Every address the evaluator writes comes
    /// from an environment lookup, so an out-of-range write indicates a bug in
    /// the caller and is logged.
    pub fn write(&mut self, address: Address, value: Value) {
        match self.cells.get_mut(address) {
            Some(cell) => *cell = value,
            None => tracing::warn!(address, len = self.cells.len(), "ignoring write outside store"),
        }
    }

    /// Number of allocated cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over `(address, value)` pairs in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (Address, &Value)> {
        self.cells.iter().enumerate()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::val;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_allocate_returns_former_length() {
        let mut store = Store::new();
        assert!(store.is_empty());
        assert_eq!(store.allocate(val(10)), 0);
        assert_eq!(store.allocate(val("b")), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.read(0).unwrap(), val(10));
        assert_eq!(store.read(1).unwrap(), val("b"));
    }

    #[test]
    fn test_allocate_many_is_contiguous() {
        let mut store = Store::new();
        store.allocate(val(0));
        let range = store.allocate_many(vec![val(1), val(2), val(3)]);
        assert_eq!(range, 1..4);
        for (offset, address) in range.enumerate() {
            assert_eq!(store.read(address).unwrap(), val(offset as i64 + 1));
        }

        // Nothing to allocate yields an empty range at the current end
        assert_eq!(store.allocate_many(Vec::new()), 4..4);
    }

    #[test]
    fn test_read_out_of_range_fails() {
        let mut store = Store::new();
        assert_eq!(store.read(0), Err(Error::IllegalAddress(0)));
        store.allocate(val(1));
        assert_eq!(store.read(1), Err(Error::IllegalAddress(1)));
        assert_eq!(
            store.read(Address::MAX),
            Err(Error::IllegalAddress(Address::MAX))
        );
    }

    #[test]
    fn test_write_out_of_range_is_ignored() {
        let mut store = Store::new();
        store.allocate(val(1));
        store.write(1, val(2));
        store.write(100, val(3));
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(0).unwrap(), val(1));
        assert_eq!(store.read(1), Err(Error::IllegalAddress(1)));
    }

    #[test]
    fn test_write_does_not_touch_other_cells() {
        let mut store = Store::new();
        let range = store.allocate_many(vec![val(1), val(2), val(3)]);
        store.write(range.start + 1, val("two"));
        let values: Vec<Value> = store.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(values, vec![val(1), val("two"), val(3)]);
    }

    proptest! {
        #[test]
        fn prop_write_then_read(initial in proptest::collection::vec(any::<i64>(), 1..32),
                                index in any::<prop::sample::Index>(),
                                written in any::<i64>()) {
            let mut store = Store::new();
            store.allocate_many(initial.iter().copied().map(Value::Number));
            let address = index.index(initial.len());

            store.write(address, Value::Number(written));

            prop_assert_eq!(store.read(address).unwrap(), Value::Number(written));
            prop_assert_eq!(store.len(), initial.len());
        }
    }
}

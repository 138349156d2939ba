use common::err::{CResult, ReError};
use common::value::Value;

/// Surface implemented by every Statement and every WHERE-carrying query
/// builder (C3): a positional and named parameter slot store that accepts
/// typed Values.
pub trait Bindable {
    /// Binds `value` at a 1-based positional slot (spec.md §4.3). Slots are
    /// created lazily: binding index 3 on an empty Statement extends the
    /// slot vector with `Value::Null` placeholders for slots 1 and 2.
    /// Index 0 is out of range and returns `BindingError`.
    fn bind_value(&mut self, index: usize, value: Value) -> CResult<()>;

    /// Binds `value` to a named slot (`:name` / `@name`). Backends without
    /// enhanced parameter mapping resolve this to a positional index at
    /// rewrite time; see `core::paramstyle`.
    fn bind_named(&mut self, name: &str, value: Value) -> CResult<()>;

    /// Appends `values` starting at the first free positional slot (1-based,
    /// `bind(list, start=1)` per spec.md §4.3), returning the index of the
    /// last slot filled. Used by query builders' `where`/`values`/`having`
    /// methods.
    fn bind_values(&mut self, values: impl IntoIterator<Item = Value>) -> CResult<usize>
    where
        Self: Sized,
    {
        let first = self.next_free_slot();
        let mut last = first;
        for value in values {
            self.bind_value(last, value)?;
            last += 1;
        }
        if last == first {
            return Err(ReError::BindingError("bind_values called with no values".into()));
        }
        Ok(last - 1)
    }

    /// 1-based index of the first positional slot not yet bound.
    fn next_free_slot(&self) -> usize;

    /// Current bound value at 1-based `index`, if any.
    fn bound_value(&self, index: usize) -> Option<&Value>;

    /// Clears every bound slot, positional and named.
    fn clear_bindings(&mut self);
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeBindable {
        slots: Vec<Option<Value>>,
        named: HashMap<String, Value>,
    }

    impl Bindable for FakeBindable {
        fn bind_value(&mut self, index: usize, value: Value) -> CResult<()> {
            if index == 0 {
                return Err(ReError::BindingError("positional index is 1-based".into()));
            }
            let zero_based = index - 1;
            if self.slots.len() <= zero_based {
                self.slots.resize(zero_based + 1, None);
            }
            self.slots[zero_based] = Some(value);
            Ok(())
        }

        fn bind_named(&mut self, name: &str, value: Value) -> CResult<()> {
            self.named.insert(name.to_string(), value);
            Ok(())
        }

        fn next_free_slot(&self) -> usize {
            self.slots.len() + 1
        }

        fn bound_value(&self, index: usize) -> Option<&Value> {
            if index == 0 {
                return None;
            }
            self.slots.get(index - 1).and_then(|v| v.as_ref())
        }

        fn clear_bindings(&mut self) {
            self.slots.clear();
            self.named.clear();
        }
    }

    #[test]
    fn bind_values_appends_from_first_free_slot() {
        let mut b = FakeBindable::default();
        b.bind_value(1, Value::Integer(1)).unwrap();
        let last = b.bind_values(vec![Value::Integer(2), Value::Integer(3)]).unwrap();
        assert_eq!(last, 3);
        assert_eq!(b.bound_value(2), Some(&Value::Integer(2)));
        assert_eq!(b.bound_value(3), Some(&Value::Integer(3)));
    }

    #[test]
    fn positional_binding_is_one_based() {
        let mut b = FakeBindable::default();
        assert!(b.bind_value(0, Value::Integer(1)).is_err());
        b.bind_value(1, Value::Integer(7)).unwrap();
        assert_eq!(b.bound_value(1), Some(&Value::Integer(7)));
        assert_eq!(b.bound_value(0), None);
    }
}

// Wrench Slot Conversions
// Narrow numeric views over the VM's double-precision number slots.
// Out-of-range values are native-module bugs and fail loudly.

use super::{SlotType, Slots};

const EPSILON: f64 = 0.000001;

/// Largest integer a double represents exactly (2^53 - 1)
pub const MAX_SAFE_INT: f64 = 9007199254740991.0;
pub const MIN_SAFE_INT: f64 = -9007199254740991.0;

fn is_safe_float(value: f64) -> bool {
    value.abs() < f32::MAX as f64 + EPSILON
}

fn is_integral(value: f64) -> bool {
    (value.trunc() - value).abs() < EPSILON
}

fn is_safe_int(value: f64) -> bool {
    value > MIN_SAFE_INT - EPSILON && value < MAX_SAFE_INT + EPSILON
}

/// Conversion helpers available on every [`Slots`] implementation
pub trait SlotExt: Slots {
    fn get_slot_float(&self, slot: usize) -> f32 {
        let value = self.get_slot_double(slot);
        assert!(
            is_safe_float(value),
            "slot {} holds {} which does not fit in an f32",
            slot,
            value
        );
        value as f32
    }

    fn set_slot_float(&mut self, slot: usize, value: f32) {
        self.set_slot_double(slot, value as f64);
    }

    /// Numbers must be integral and within the safe-integer range.
    /// Booleans read as 0 or 1.
    fn get_slot_int(&self, slot: usize) -> i32 {
        match self.slot_type(slot) {
            SlotType::Num => {
                let value = self.get_slot_double(slot);
                assert!(is_integral(value), "slot {} holds non-integer {}", slot, value);
                assert!(is_safe_int(value), "slot {} holds unsafe integer {}", slot, value);
                assert!(
                    (i32::MIN as f64..=i32::MAX as f64).contains(&value),
                    "slot {} holds {} which does not fit in an i32",
                    slot,
                    value
                );
                value.trunc() as i32
            }
            SlotType::Bool => self.get_slot_bool(slot) as i32,
            other => panic!("slot {} holds {:?}, expected Num or Bool", slot, other),
        }
    }

    fn set_slot_int(&mut self, slot: usize, value: i32) {
        self.set_slot_double(slot, value as f64);
    }

    fn get_slot_byte(&self, slot: usize) -> u8 {
        let value = self.get_slot_int(slot);
        assert!(
            (0..=u8::MAX as i32).contains(&value),
            "slot {} holds {} which is not a byte",
            slot,
            value
        );
        value as u8
    }

    fn set_slot_byte(&mut self, slot: usize, value: u8) {
        self.set_slot_int(slot, value as i32);
    }
}

impl<T: Slots + ?Sized> SlotExt for T {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory stand-in for the VM's slot array
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum SlotValue {
        Null,
        Bool(bool),
        Num(f64),
        Str(String),
    }

    #[derive(Debug, Default)]
    pub(crate) struct TestSlots {
        pub(crate) values: Vec<SlotValue>,
        pub(crate) aborted: Option<usize>,
    }

    impl TestSlots {
        pub(crate) fn with(values: Vec<SlotValue>) -> Self {
            Self {
                values,
                aborted: None,
            }
        }
    }

    impl Slots for TestSlots {
        fn slot_count(&self) -> usize {
            self.values.len()
        }

        fn ensure_slots(&mut self, count: usize) {
            if self.values.len() < count {
                self.values.resize(count, SlotValue::Null);
            }
        }

        fn slot_type(&self, slot: usize) -> SlotType {
            match &self.values[slot] {
                SlotValue::Null => SlotType::Null,
                SlotValue::Bool(_) => SlotType::Bool,
                SlotValue::Num(_) => SlotType::Num,
                SlotValue::Str(_) => SlotType::String,
            }
        }

        fn get_slot_bool(&self, slot: usize) -> bool {
            matches!(self.values[slot], SlotValue::Bool(true))
        }

        fn set_slot_bool(&mut self, slot: usize, value: bool) {
            self.values[slot] = SlotValue::Bool(value);
        }

        fn get_slot_double(&self, slot: usize) -> f64 {
            match self.values[slot] {
                SlotValue::Num(n) => n,
                _ => 0.0,
            }
        }

        fn set_slot_double(&mut self, slot: usize, value: f64) {
            self.values[slot] = SlotValue::Num(value);
        }

        fn get_slot_string(&self, slot: usize) -> &str {
            match &self.values[slot] {
                SlotValue::Str(s) => s,
                _ => "",
            }
        }

        fn set_slot_string(&mut self, slot: usize, value: &str) {
            self.values[slot] = SlotValue::Str(value.to_string());
        }

        fn set_slot_null(&mut self, slot: usize) {
            self.values[slot] = SlotValue::Null;
        }

        fn abort_fiber(&mut self, slot: usize) {
            self.aborted = Some(slot);
        }
    }

    #[test]
    fn test_int_from_number_and_bool() {
        let slots = TestSlots::with(vec![SlotValue::Num(42.0), SlotValue::Bool(true)]);
        assert_eq!(slots.get_slot_int(0), 42);
        assert_eq!(slots.get_slot_int(1), 1);
    }

    #[test]
    #[should_panic(expected = "non-integer")]
    fn test_int_rejects_fraction() {
        let slots = TestSlots::with(vec![SlotValue::Num(1.5)]);
        slots.get_slot_int(0);
    }

    #[test]
    #[should_panic(expected = "expected Num or Bool")]
    fn test_int_rejects_string() {
        let slots = TestSlots::with(vec![SlotValue::Str("3".into())]);
        slots.get_slot_int(0);
    }

    #[test]
    #[should_panic(expected = "does not fit in an i32")]
    fn test_int_rejects_values_past_i32() {
        let slots = TestSlots::with(vec![SlotValue::Num(3.0e9)]);
        slots.get_slot_int(0);
    }

    #[test]
    fn test_int_accepts_i32_bounds() {
        let slots = TestSlots::with(vec![
            SlotValue::Num(i32::MAX as f64),
            SlotValue::Num(i32::MIN as f64),
        ]);
        assert_eq!(slots.get_slot_int(0), i32::MAX);
        assert_eq!(slots.get_slot_int(1), i32::MIN);
    }

    #[test]
    fn test_byte_round_trip_through_slot() {
        let mut slots = TestSlots::with(vec![SlotValue::Null]);
        slots.set_slot_byte(0, 255);
        assert_eq!(slots.values[0], SlotValue::Num(255.0));
        assert_eq!(slots.get_slot_byte(0), 255);
    }

    #[test]
    #[should_panic(expected = "not a byte")]
    fn test_byte_rejects_out_of_range() {
        let slots = TestSlots::with(vec![SlotValue::Num(256.0)]);
        slots.get_slot_byte(0);
    }

    #[test]
    fn test_float_narrowing() {
        let mut slots = TestSlots::with(vec![SlotValue::Num(0.5)]);
        assert_eq!(slots.get_slot_float(0), 0.5f32);
        slots.set_slot_float(0, 2.25);
        assert_eq!(slots.get_slot_double(0), 2.25);
    }

    #[test]
    #[should_panic(expected = "does not fit in an f32")]
    fn test_float_rejects_huge_value() {
        let slots = TestSlots::with(vec![SlotValue::Num(1.0e300)]);
        slots.get_slot_float(0);
    }
}

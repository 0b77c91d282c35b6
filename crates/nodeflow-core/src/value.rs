use std::any::Any;
use std::fmt::Debug;

use downcast_rs::{impl_downcast, Downcast};
use dyn_clone::DynClone;

/// A type-erased value that can travel over an edge.
///
/// Implemented automatically for every `'static` type that is `Send` and
/// `Clone`. Values are cloned out of the edge cell on every read so that
/// an output fanning out to several inputs hands each consumer its own
/// copy.
pub trait PortValue: Downcast + DynClone + Send + Debug {}

impl_downcast!(PortValue);
dyn_clone::clone_trait_object!(PortValue);

impl<T> PortValue for T where T: Any + Send + Clone + Debug {}

/// An owned, type-erased edge value.
pub type BoxedValue = Box<dyn PortValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boxed_values_clone_and_downcast() {
        let value: BoxedValue = Box::new(7_i32);
        let copy = value.clone();

        assert_eq!(*value.downcast::<i32>().unwrap(), 7);
        assert_eq!(*copy.downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let value: BoxedValue = Box::new(String::from("hello"));
        assert!(value.downcast::<i32>().is_err());
    }
}

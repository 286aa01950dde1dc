//! Type-erased value holder backing the evaluator's generic cache.
//!
//! The generic cache is a single map shared by every engine-cached request
//! kind, and the result types of those kinds are unrelated to each other.
//! [`AnyValue`] stores a result of any type behind one uniform handle. Values
//! that fit in [`Config::Storage`] are stored inline.
//!
//! ```rust
//! use demand::AnyValue;
//!
//! let superclass: AnyValue = AnyValue::wrap(Some("NSObject".to_string()));
//!
//! assert!(superclass.is::<Option<String>>());
//! assert_eq!(
//!     superclass.cloned::<Option<String>>(),
//!     Some("NSObject".to_string())
//! );
//!
//! // Holders of different types never compare equal.
//! let narrow: AnyValue = AnyValue::wrap(1u32);
//! let wide: AnyValue = AnyValue::wrap(1u64);
//! assert_ne!(narrow, wide);
//! ```
//!
//! [`Config::Storage`]: crate::Config::Storage

use std::{
    any::{Any, type_name},
    fmt::{self, Debug},
};

use smallbox::SmallBox;

use crate::config::{Config, DefaultConfig};

/// Object-safe interface of a value stored in an [`AnyValue`].
///
/// Implemented for every `'static` type that is [`Debug`] and
/// [`PartialEq`].
pub trait DynValue: Any + Debug {
    /// Compares with another erased value. Values of different types are
    /// never equal.
    fn eq_dyn(&self, other: &dyn DynValue) -> bool;

    /// Returns the name of the concrete type.
    fn type_name(&self) -> &'static str;

    /// Returns `self` as [`Any`] for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Debug + PartialEq> DynValue for T {
    fn eq_dyn(&self, other: &dyn DynValue) -> bool {
        other.as_any().downcast_ref::<T>().is_some_and(|other| self == other)
    }

    fn type_name(&self) -> &'static str { type_name::<T>() }

    fn as_any(&self) -> &dyn Any { self }
}

/// A value of arbitrary type behind a uniform handle.
pub struct AnyValue<C: Config = DefaultConfig> {
    holder: SmallBox<dyn DynValue, C::Storage>,
}

impl<C: Config> AnyValue<C> {
    /// Wraps `value`.
    pub fn wrap<T: Any + Debug + PartialEq>(value: T) -> Self {
        let holder: SmallBox<dyn DynValue, C::Storage> =
            smallbox::smallbox!(value);

        Self { holder }
    }

    /// Returns the name of the wrapped type.
    #[must_use]
    pub fn type_name(&self) -> &'static str { self.erased().type_name() }

    /// Returns whether the wrapped value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool { self.erased().as_any().is::<T>() }

    /// Returns a reference to the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.erased().as_any().downcast_ref::<T>()
    }

    /// Returns a clone of the wrapped value.
    ///
    /// # Panics
    ///
    /// Panics if the wrapped value is not a `T`. Reading a value with a type
    /// other than the one it was wrapped with is an engine bug, never a user
    /// error.
    #[must_use]
    pub fn cloned<T: Any + Clone>(&self) -> T {
        self.downcast_ref::<T>().cloned().unwrap_or_else(|| {
            panic!(
                "type mismatch: the value holder contains `{}` but was read \
                 as `{}`",
                self.type_name(),
                type_name::<T>()
            )
        })
    }

    fn erased(&self) -> &dyn DynValue { &*self.holder }
}

impl<C: Config> PartialEq for AnyValue<C> {
    fn eq(&self, other: &Self) -> bool { self.erased().eq_dyn(other.erased()) }
}

impl<C: Config> Debug for AnyValue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self.erased(), f)
    }
}

#[cfg(test)]
mod test {
    use super::AnyValue;
    use crate::config::{DefaultConfig, smallbox_space::S1};

    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
    )]
    struct TinyConfig;

    impl crate::Config for TinyConfig {
        type Storage = S1;
        type BuildHasher = fxhash::FxBuildHasher;
    }

    #[test]
    fn wrap_and_read_back() {
        let value = AnyValue::<DefaultConfig>::wrap(vec![1, 2, 3]);

        assert!(value.is::<Vec<i32>>());
        assert!(!value.is::<Vec<u32>>());
        assert_eq!(value.cloned::<Vec<i32>>(), vec![1, 2, 3]);
        assert_eq!(value.downcast_ref::<Vec<i32>>().map(Vec::len), Some(3));
    }

    #[test]
    fn equality_requires_same_type_and_value() {
        let a = AnyValue::<DefaultConfig>::wrap("final".to_string());
        let b = AnyValue::<DefaultConfig>::wrap("final".to_string());
        let c = AnyValue::<DefaultConfig>::wrap("open".to_string());
        let d = AnyValue::<DefaultConfig>::wrap("final");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn values_larger_than_inline_storage() {
        let value = AnyValue::<TinyConfig>::wrap([7u64; 16]);

        assert_eq!(value.cloned::<[u64; 16]>(), [7; 16]);
        assert_eq!(format!("{value:?}"), format!("{:?}", [7u64; 16]));
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn reading_with_the_wrong_type_is_fatal() {
        let value = AnyValue::<DefaultConfig>::wrap(42u32);

        let _: i64 = value.cloned::<i64>();
    }
}

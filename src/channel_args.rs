//! Generic, type-erased channel configuration.
//!
//! [`ChannelArgs`] maps string keys to integers, strings or opaque pointer
//! values.  A pointer value carries its own capability set through the
//! [`PointerArg`] trait:
//!
//! - **copy**: [`PointerArg::copy`], called when the args are cloned
//! - **destroy**: `Drop` of the boxed value
//! - **compare**: [`PointerArg::compare`], used to order and deduplicate
//!   configurations
//!
//! This lets the map manage shared resources (such as a session cache)
//! without knowing their concrete type.

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Capability set of an opaque pointer value.
pub trait PointerArg: Any + Send + Sync + fmt::Debug {
    /// Take another reference to the same underlying object.
    fn copy(&self) -> Box<dyn PointerArg>;

    /// Order against another value of the same concrete type.
    ///
    /// Values only compare equal when they denote the same object.
    fn compare(&self, other: &dyn PointerArg) -> Ordering;

    /// Access for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A single configuration value.
#[derive(Debug)]
pub enum ArgValue {
    /// Integer value.
    Integer(i64),
    /// String value.
    String(String),
    /// Opaque shared object.
    Pointer(Box<dyn PointerArg>),
}

impl ArgValue {
    fn rank(&self) -> u8 {
        match self {
            Self::Integer(_) => 0,
            Self::String(_) => 1,
            Self::Pointer(_) => 2,
        }
    }
}

impl Clone for ArgValue {
    fn clone(&self) -> Self {
        match self {
            Self::Integer(v) => Self::Integer(*v),
            Self::String(v) => Self::String(v.clone()),
            Self::Pointer(p) => Self::Pointer(p.copy()),
        }
    }
}

impl Ord for ArgValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Pointer(a), Self::Pointer(b)) => {
                let (ta, tb) = (a.as_any().type_id(), b.as_any().type_id());
                if ta == tb {
                    a.compare(&**b)
                } else {
                    ta.cmp(&tb)
                }
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for ArgValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ArgValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ArgValue {}

/// Ordered key/value channel configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelArgs {
    args: BTreeMap<String, ArgValue>,
}

impl ChannelArgs {
    /// Empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: ArgValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Set `key`, returning the value it replaces.
    pub fn insert(&mut self, key: impl Into<String>, value: ArgValue) -> Option<ArgValue> {
        self.args.insert(key.into(), value)
    }

    /// Remove `key`.
    pub fn remove(&mut self, key: &str) -> Option<ArgValue> {
        self.args.remove(key)
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.args.get(key)
    }

    /// Integer stored under `key`.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ArgValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// String stored under `key`.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ArgValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Pointer of concrete type `T` stored under `key`.
    pub fn get_pointer<T: PointerArg>(&self, key: &str) -> Option<&T> {
        match self.get(key)? {
            ArgValue::Pointer(p) => p.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

//! `Describe` for standard library types.

use std::any::Any;
use std::borrow::Cow;
use std::collections::{btree_map, hash_map, BTreeMap, HashMap, VecDeque};
use std::hash::Hash;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, OnceLock};

use super::shapes::{MapOps, MapShape, OptionOps, OptionShape, PointerOps, PointerShape, Prim, SeqOps, SeqShape};
use super::{cast, cast_mut, zero_of, Describe, Kind, TypeDescriptor, TypeRef};

// ============================================================================
// Primitives
// ============================================================================

macro_rules! describe_prim {
    ($($ty:ty => $prim:ident),* $(,)?) => {
        $(
            impl Describe for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::new::<$ty>(Kind::Prim(Prim::$prim))
                }

                fn zero() -> Option<Self> {
                    Some(<$ty>::default())
                }
            }
        )*
    };
}

describe_prim! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
    &'static str => StaticStr,
}

// ============================================================================
// Map keys
// ============================================================================

/// A type usable as a JSON object key.
pub trait MapKey: Describe + Eq + Hash + Ord {
    fn to_key(&self) -> Cow<'_, str>;

    fn from_key(key: &str) -> Option<Self>
    where
        Self: Sized;
}

impl MapKey for String {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_string())
    }
}

macro_rules! int_map_key {
    ($($ty:ty),*) => {
        $(
            impl MapKey for $ty {
                fn to_key(&self) -> Cow<'_, str> {
                    Cow::Owned(self.to_string())
                }

                fn from_key(key: &str) -> Option<Self> {
                    key.parse().ok()
                }
            }
        )*
    };
}

int_map_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

// ============================================================================
// Sequences
// ============================================================================

fn vec_len<T: 'static>(v: &dyn Any) -> usize {
    cast::<Vec<T>>(v).map_or(0, Vec::len)
}

fn vec_get<T: 'static>(v: &dyn Any, i: usize) -> Option<&dyn Any> {
    cast::<Vec<T>>(v)?.get(i).map(|e| e as &dyn Any)
}

fn vec_clear<T: 'static>(v: &mut dyn Any) {
    if let Some(v) = cast_mut::<Vec<T>>(v) {
        v.clear();
    }
}

fn vec_slot<T: Describe>(v: &mut dyn Any, i: usize) -> Option<&mut dyn Any> {
    let v = cast_mut::<Vec<T>>(v)?;
    if i >= v.len() {
        v.push(zero_of::<T>()?);
    }
    v.get_mut(i).map(|e| e as &mut dyn Any)
}

fn vec_finish<T: 'static>(v: &mut dyn Any, n: usize) {
    if let Some(v) = cast_mut::<Vec<T>>(v) {
        v.truncate(n);
    }
}

impl<T: Describe> Describe for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Seq(SeqShape {
            elem: TypeRef::of::<T>(),
            ops: SeqOps {
                len: vec_len::<T>,
                get: vec_get::<T>,
                begin: vec_clear::<T>,
                slot: vec_slot::<T>,
                finish: vec_finish::<T>,
                clear: vec_clear::<T>,
            },
            fixed_len: None,
        }))
    }

    fn zero() -> Option<Self> {
        Some(Vec::new())
    }
}

fn deque_len<T: 'static>(v: &dyn Any) -> usize {
    cast::<VecDeque<T>>(v).map_or(0, VecDeque::len)
}

fn deque_get<T: 'static>(v: &dyn Any, i: usize) -> Option<&dyn Any> {
    cast::<VecDeque<T>>(v)?.get(i).map(|e| e as &dyn Any)
}

fn deque_clear<T: 'static>(v: &mut dyn Any) {
    if let Some(v) = cast_mut::<VecDeque<T>>(v) {
        v.clear();
    }
}

fn deque_slot<T: Describe>(v: &mut dyn Any, i: usize) -> Option<&mut dyn Any> {
    let v = cast_mut::<VecDeque<T>>(v)?;
    if i >= v.len() {
        v.push_back(zero_of::<T>()?);
    }
    v.get_mut(i).map(|e| e as &mut dyn Any)
}

fn deque_finish<T: 'static>(v: &mut dyn Any, n: usize) {
    if let Some(v) = cast_mut::<VecDeque<T>>(v) {
        v.truncate(n);
    }
}

impl<T: Describe> Describe for VecDeque<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Seq(SeqShape {
            elem: TypeRef::of::<T>(),
            ops: SeqOps {
                len: deque_len::<T>,
                get: deque_get::<T>,
                begin: deque_clear::<T>,
                slot: deque_slot::<T>,
                finish: deque_finish::<T>,
                clear: deque_clear::<T>,
            },
            fixed_len: None,
        }))
    }

    fn zero() -> Option<Self> {
        Some(VecDeque::new())
    }
}

fn array_len<T: 'static, const N: usize>(_: &dyn Any) -> usize {
    N
}

fn array_get<T: 'static, const N: usize>(v: &dyn Any, i: usize) -> Option<&dyn Any> {
    cast::<[T; N]>(v)?.get(i).map(|e| e as &dyn Any)
}

fn array_noop(_: &mut dyn Any) {}

fn array_slot<T: 'static, const N: usize>(v: &mut dyn Any, i: usize) -> Option<&mut dyn Any> {
    cast_mut::<[T; N]>(v)?.get_mut(i).map(|e| e as &mut dyn Any)
}

fn array_finish<T: Describe, const N: usize>(v: &mut dyn Any, n: usize) {
    if let Some(v) = cast_mut::<[T; N]>(v) {
        for slot in v.iter_mut().skip(n) {
            if let Some(zero) = zero_of::<T>() {
                *slot = zero;
            }
        }
    }
}

impl<T: Describe, const N: usize> Describe for [T; N] {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Seq(SeqShape {
            elem: TypeRef::of::<T>(),
            ops: SeqOps {
                len: array_len::<T, N>,
                get: array_get::<T, N>,
                begin: array_noop,
                slot: array_slot::<T, N>,
                finish: array_finish::<T, N>,
                clear: array_noop,
            },
            fixed_len: Some(N),
        }))
    }

    fn zero() -> Option<Self> {
        let items: Vec<T> = (0..N).map(|_| T::zero()).collect::<Option<_>>()?;
        items.try_into().ok()
    }
}

// ============================================================================
// Maps
// ============================================================================

macro_rules! map_ops {
    ($map:ident, $entry:ident, $len:ident, $entries:ident, $slot:ident, $clear:ident) => {
        fn $len<K: MapKey, V: 'static>(m: &dyn Any) -> usize {
            cast::<$map<K, V>>(m).map_or(0, $map::len)
        }

        fn $entries<K: MapKey, V: 'static>(m: &dyn Any) -> Vec<(Cow<'_, str>, &dyn Any)> {
            match cast::<$map<K, V>>(m) {
                Some(map) => map.iter().map(|(k, v)| (k.to_key(), v as &dyn Any)).collect(),
                None => Vec::new(),
            }
        }

        fn $slot<'a, K: MapKey, V: Describe>(m: &'a mut dyn Any, key: &str) -> Option<&'a mut dyn Any> {
            let key = K::from_key(key)?;
            let zero = zero_of::<V>()?;
            let map = cast_mut::<$map<K, V>>(m)?;
            let slot = match map.entry(key) {
                $entry::Entry::Occupied(e) => {
                    let slot = e.into_mut();
                    *slot = zero;
                    slot
                }
                $entry::Entry::Vacant(e) => e.insert(zero),
            };
            Some(slot as &mut dyn Any)
        }

        fn $clear<K: MapKey, V: 'static>(m: &mut dyn Any) {
            if let Some(map) = cast_mut::<$map<K, V>>(m) {
                map.clear();
            }
        }
    };
}

map_ops!(HashMap, hash_map, hash_len, hash_entries, hash_slot, hash_clear);
map_ops!(BTreeMap, btree_map, btree_len, btree_entries, btree_slot, btree_clear);

impl<K: MapKey, V: Describe> Describe for HashMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Map(MapShape {
            key: TypeRef::of::<K>(),
            value: TypeRef::of::<V>(),
            ops: MapOps {
                len: hash_len::<K, V>,
                entries: hash_entries::<K, V>,
                slot: hash_slot::<K, V>,
                clear: hash_clear::<K, V>,
            },
        }))
    }

    fn zero() -> Option<Self> {
        Some(HashMap::new())
    }
}

impl<K: MapKey, V: Describe> Describe for BTreeMap<K, V> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Map(MapShape {
            key: TypeRef::of::<K>(),
            value: TypeRef::of::<V>(),
            ops: MapOps {
                len: btree_len::<K, V>,
                entries: btree_entries::<K, V>,
                slot: btree_slot::<K, V>,
                clear: btree_clear::<K, V>,
            },
        }))
    }

    fn zero() -> Option<Self> {
        Some(BTreeMap::new())
    }
}

// ============================================================================
// Optional values
// ============================================================================

fn option_get<T: 'static>(v: &dyn Any) -> Option<&dyn Any> {
    cast::<Option<T>>(v)?.as_ref().map(|x| x as &dyn Any)
}

fn option_insert<T: Describe>(v: &mut dyn Any) -> Option<&mut dyn Any> {
    let v = cast_mut::<Option<T>>(v)?;
    if v.is_none() {
        *v = Some(zero_of::<T>()?);
    }
    v.as_mut().map(|x| x as &mut dyn Any)
}

fn option_clear<T: 'static>(v: &mut dyn Any) {
    if let Some(v) = cast_mut::<Option<T>>(v) {
        *v = None;
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Option(OptionShape {
            inner: TypeRef::of::<T>(),
            ops: OptionOps {
                get: option_get::<T>,
                get_or_insert: option_insert::<T>,
                clear: option_clear::<T>,
            },
        }))
    }

    fn zero() -> Option<Self> {
        Some(None)
    }
}

fn once_get<T: 'static>(v: &dyn Any) -> Option<&dyn Any> {
    cast::<OnceLock<T>>(v)?.get().map(|x| x as &dyn Any)
}

fn once_insert<T: Describe>(v: &mut dyn Any) -> Option<&mut dyn Any> {
    let lock = cast_mut::<OnceLock<T>>(v)?;
    if lock.get().is_none() {
        // Exclusive access: nothing can race this set.
        let _ = lock.set(zero_of::<T>()?);
    }
    lock.get_mut().map(|x| x as &mut dyn Any)
}

fn once_clear<T: 'static>(v: &mut dyn Any) {
    if let Some(lock) = cast_mut::<OnceLock<T>>(v) {
        lock.take();
    }
}

impl<T: Describe> Describe for OnceLock<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Option(OptionShape {
            inner: TypeRef::of::<T>(),
            ops: OptionOps {
                get: once_get::<T>,
                get_or_insert: once_insert::<T>,
                clear: once_clear::<T>,
            },
        }))
    }

    fn zero() -> Option<Self> {
        Some(OnceLock::new())
    }
}

// ============================================================================
// Pointers
// ============================================================================

fn box_deref<T: 'static>(v: &dyn Any) -> Option<&dyn Any> {
    cast::<Box<T>>(v).map(|b| &**b as &dyn Any)
}

fn box_deref_mut<T: 'static>(v: &mut dyn Any) -> Option<&mut dyn Any> {
    cast_mut::<Box<T>>(v).map(|b| &mut **b as &mut dyn Any)
}

fn box_addr<T: 'static>(v: &dyn Any) -> usize {
    cast::<Box<T>>(v).map_or(0, |b| &**b as *const T as usize)
}

impl<T: Describe> Describe for Box<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Kind::Pointer(PointerShape {
            inner: TypeRef::of::<T>(),
            ops: PointerOps {
                deref: box_deref::<T>,
                deref_mut: box_deref_mut::<T>,
                addr: box_addr::<T>,
            },
            shared: false,
        }))
    }

    fn zero() -> Option<Self> {
        T::zero().map(Box::new)
    }
}

macro_rules! shared_pointer {
    ($ptr:ident, $deref:ident, $deref_mut:ident, $addr:ident) => {
        fn $deref<T: 'static>(v: &dyn Any) -> Option<&dyn Any> {
            cast::<$ptr<T>>(v).map(|p| &**p as &dyn Any)
        }

        fn $deref_mut<T: Describe>(v: &mut dyn Any) -> Option<&mut dyn Any> {
            let p = cast_mut::<$ptr<T>>(v)?;
            if $ptr::get_mut(p).is_none() {
                *p = $ptr::new(zero_of::<T>()?);
            }
            $ptr::get_mut(p).map(|x| x as &mut dyn Any)
        }

        fn $addr<T: 'static>(v: &dyn Any) -> usize {
            cast::<$ptr<T>>(v).map_or(0, |p| $ptr::as_ptr(p) as usize)
        }

        impl<T: Describe> Describe for $ptr<T> {
            fn describe() -> TypeDescriptor {
                TypeDescriptor::new::<Self>(Kind::Pointer(PointerShape {
                    inner: TypeRef::of::<T>(),
                    ops: PointerOps {
                        deref: $deref::<T>,
                        deref_mut: $deref_mut::<T>,
                        addr: $addr::<T>,
                    },
                    shared: true,
                }))
            }

            fn zero() -> Option<Self> {
                T::zero().map($ptr::new)
            }
        }
    };
}

shared_pointer!(Arc, arc_deref, arc_deref_mut, arc_addr);
shared_pointer!(Rc, rc_deref, rc_deref_mut, rc_addr);

// ============================================================================
// Types with no JSON representation
// ============================================================================

impl<R: 'static> Describe for fn() -> R {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }

    fn zero() -> Option<Self> {
        None
    }
}

impl<A: 'static, R: 'static> Describe for fn(A) -> R {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }

    fn zero() -> Option<Self> {
        None
    }
}

impl<T: 'static> Describe for Sender<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }

    fn zero() -> Option<Self> {
        None
    }
}

impl<T: 'static> Describe for Receiver<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Self>()
    }

    fn zero() -> Option<Self> {
        None
    }
}

//! Small shared building blocks used across the engine: the single-threaded
//! shared-ownership cell, the dirty flag, collation/compare options, and the
//! raw page-buffer view (`BufferSlice`) that page codecs read and write through.

use crate::Result;
use crate::bson;
use crate::engine::PageAddress;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

/// This engine is single-threaded/cooperative (see the crate doc comment), so
/// shared, mutable ownership of a page or header is `Rc<RefCell<T>>` rather than
/// an `Arc<Mutex<T>>`: there is never a second OS thread to race against, only
/// re-entrant `.await` points, and `RefCell`'s runtime borrow check is exactly
/// the protection those points need.
pub(crate) type Shared<T> = Rc<RefCell<T>>;

pub(crate) fn new_shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Tracks whether a page's in-memory representation has diverged from its
/// last-written buffer bytes. `Cell<bool>` so it can sit behind a shared
/// `&self` while the rest of the page is behind `&mut self`.
#[derive(Debug, Default)]
pub(crate) struct DirtyFlag(Cell<bool>);

impl DirtyFlag {
    pub fn new() -> Self {
        DirtyFlag(Cell::new(false))
    }

    pub fn set(&self) {
        self.0.set(true);
    }

    pub fn clear(&self) {
        self.0.set(false);
    }

    pub fn get(&self) -> bool {
        self.0.get()
    }
}

/// Ordering direction for index scans and skip-list traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn reverse(self) -> Order {
        match self {
            Order::Ascending => Order::Descending,
            Order::Descending => Order::Ascending,
        }
    }
}

/// Mirrors `System.Globalization.CompareOptions`: a small bitset tuning string
/// comparisons (case, width, kana, symbols). Only the flags the collation
/// pragma string (`lcid/options`) actually persists are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CompareOptions(u32);

impl CompareOptions {
    pub const NONE: CompareOptions = CompareOptions(0);
    pub const IGNORE_CASE: CompareOptions = CompareOptions(1);
    pub const IGNORE_NON_SPACE: CompareOptions = CompareOptions(2);
    pub const IGNORE_SYMBOLS: CompareOptions = CompareOptions(4);
    pub const IGNORE_KANA_TYPE: CompareOptions = CompareOptions(8);
    pub const IGNORE_WIDTH: CompareOptions = CompareOptions(16);
    pub const STRING_SORT: CompareOptions = CompareOptions(536870912);
    pub const ORDINAL: CompareOptions = CompareOptions(1073741824);

    pub fn contains(self, other: CompareOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: CompareOptions) -> CompareOptions {
        CompareOptions(self.0 | other.0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> CompareOptions {
        CompareOptions(bits)
    }
}

impl std::ops::BitOr for CompareOptions {
    type Output = CompareOptions;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Collation controls string ordering and equality for index keys. Persisted
/// in the header page's `COLLATION` pragma as `"{lcid}/{options}"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Collation {
    lcid: i32,
    sort_options: CompareOptions,
}

impl Default for Collation {
    fn default() -> Self {
        Collation {
            lcid: 127, // invariant culture
            sort_options: CompareOptions::IGNORE_CASE,
        }
    }
}

impl Collation {
    pub fn new(lcid: i32, sort_options: CompareOptions) -> Self {
        Collation { lcid, sort_options }
    }

    pub fn lcid(&self) -> i32 {
        self.lcid
    }

    pub fn sort_options(&self) -> CompareOptions {
        self.sort_options
    }

    pub fn parse(s: &str) -> Option<Collation> {
        let (lcid, options) = s.split_once('/')?;
        let lcid = lcid.parse().ok()?;
        let options: u32 = options.parse().ok()?;
        Some(Collation::new(lcid, CompareOptions::from_bits(options)))
    }

    pub fn to_pragma_string(&self) -> String {
        format!("{}/{}", self.lcid, self.sort_options.bits())
    }

    /// Compares two strings the way the configured collation would. The
    /// default (invariant culture, `IGNORE_CASE`) case-folds via Unicode
    /// simple case folding; `ORDINAL` compares raw code points.
    pub fn compare_str(&self, a: &str, b: &str) -> Ordering {
        if self.sort_options.contains(CompareOptions::ORDINAL) {
            return a.cmp(b);
        }
        if self.sort_options.contains(CompareOptions::IGNORE_CASE) {
            let ac = a.chars().flat_map(char::to_lowercase);
            let bc = b.chars().flat_map(char::to_lowercase);
            return ac.cmp(bc);
        }
        a.cmp(b)
    }

    /// Orders two `bson::Value`s the way an index built under this collation
    /// would: the cross-type table from the design notes, numbers compared
    /// by value, strings via `compare_str`.
    pub fn compare_values(&self, a: &bson::Value, b: &bson::Value) -> Ordering {
        fn rank(v: &bson::Value) -> u8 {
            match v {
                bson::Value::MinValue => 0,
                bson::Value::Null => 1,
                bson::Value::Int32(_)
                | bson::Value::Int64(_)
                | bson::Value::Double(_)
                | bson::Value::Decimal(_) => 2,
                bson::Value::String(_) => 3,
                bson::Value::Document(_) => 4,
                bson::Value::Array(_) => 5,
                bson::Value::Binary(_) => 6,
                bson::Value::ObjectId(_) => 7,
                bson::Value::Guid(_) => 7,
                bson::Value::Boolean(_) => 8,
                bson::Value::DateTime(_) => 9,
                bson::Value::MaxValue => 10,
            }
        }

        match (a, b) {
            (bson::Value::String(x), bson::Value::String(y)) => self.compare_str(x, y),
            (x, y) => match (as_f64(x), as_f64(y)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => rank(a).cmp(&rank(b)),
            },
        }
    }
}

fn as_f64(v: &bson::Value) -> Option<f64> {
    match v {
        bson::Value::Int32(i) => Some(*i as f64),
        bson::Value::Int64(i) => Some(*i as f64),
        bson::Value::Double(d) => Some(*d),
        _ => None,
    }
}

/// Case-insensitive (ordinal, ASCII-fold, like .NET's
/// `StringComparer.OrdinalIgnoreCase`) string key, used for collection and
/// sequence names so `"Foo"` and `"foo"` refer to the same entry.
#[derive(Debug, Clone)]
pub(crate) struct CaseInsensitiveString(pub String);

impl CaseInsensitiveString {
    pub fn new(s: impl Into<String>) -> Self {
        CaseInsensitiveString(s.into())
    }
}

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}
impl Eq for CaseInsensitiveString {}

impl std::hash::Hash for CaseInsensitiveString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            b.to_ascii_uppercase().hash(state);
        }
    }
}

impl std::borrow::Borrow<str> for CaseInsensitiveString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Thin typed wrapper over [`slab::Slab`] for collections of values addressed
/// by a stable integer handle (used by in-process bookkeeping that isn't
/// itself page-addressed, e.g. open-cursor/transaction registries).
pub(crate) struct KeyArena<T> {
    slab: slab::Slab<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ArenaKey(usize);

impl<T> KeyArena<T> {
    pub fn new() -> Self {
        KeyArena {
            slab: slab::Slab::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> ArenaKey {
        ArenaKey(self.slab.insert(value))
    }

    pub fn remove(&mut self, key: ArenaKey) -> T {
        self.slab.remove(key.0)
    }

    pub fn get(&self, key: ArenaKey) -> Option<&T> {
        self.slab.get(key.0)
    }

    pub fn get_mut(&mut self, key: ArenaKey) -> Option<&mut T> {
        self.slab.get_mut(key.0)
    }
}

impl<T> Default for KeyArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------
// BufferSlice
// ---------------------------------------------------------------------

/// An unsized, transparent view over a byte range inside a
/// [`PageBuffer`](crate::engine::PageBuffer).
///
/// Modelled the way `std::path::Path` wraps `str`/`OsStr`: a `BufferSlice` is
/// never owned, only ever seen as `&BufferSlice`/`&mut BufferSlice` borrowed
/// out of a page's backing array (or, via [`BufferSlice::slice`], out of
/// another `BufferSlice`). This keeps page codecs free of lifetime
/// parameters on the slice type itself while the borrow checker still tracks
/// aliasing against the owning `PageBuffer`.
#[repr(transparent)]
pub(crate) struct BufferSlice([u8]);

impl BufferSlice {
    pub fn new(bytes: &[u8]) -> &BufferSlice {
        unsafe { &*(bytes as *const [u8] as *const BufferSlice) }
    }

    pub fn new_mut(bytes: &mut [u8]) -> &mut BufferSlice {
        unsafe { &mut *(bytes as *mut [u8] as *mut BufferSlice) }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn slice(&self, offset: usize, length: usize) -> &BufferSlice {
        BufferSlice::new(&self.0[offset..offset + length])
    }

    pub fn slice_mut(&mut self, offset: usize, length: usize) -> &mut BufferSlice {
        BufferSlice::new_mut(&mut self.0[offset..offset + length])
    }

    fn read<const S: usize>(&self, pos: usize) -> [u8; S] {
        self.0[pos..pos + S].try_into().unwrap()
    }

    pub fn read_u8(&self, pos: usize) -> u8 {
        self.0[pos]
    }

    pub fn read_i8(&self, pos: usize) -> i8 {
        self.0[pos] as i8
    }

    pub fn read_u16(&self, pos: usize) -> u16 {
        u16::from_le_bytes(self.read(pos))
    }

    pub fn read_u32(&self, pos: usize) -> u32 {
        u32::from_le_bytes(self.read(pos))
    }

    pub fn read_u64(&self, pos: usize) -> u64 {
        u64::from_le_bytes(self.read(pos))
    }

    pub fn read_i32(&self, pos: usize) -> i32 {
        i32::from_le_bytes(self.read(pos))
    }

    pub fn read_i64(&self, pos: usize) -> i64 {
        i64::from_le_bytes(self.read(pos))
    }

    pub fn read_f64(&self, pos: usize) -> f64 {
        f64::from_le_bytes(self.read(pos))
    }

    pub fn read_bool(&self, pos: usize) -> bool {
        self.0[pos] != 0
    }

    pub fn read_bytes(&self, pos: usize, length: usize) -> &[u8] {
        &self.0[pos..pos + length]
    }

    pub fn read_page_address(&self, pos: usize) -> PageAddress {
        let page_id = self.read_u32(pos);
        let index = self.read_u8(pos + 4);
        PageAddress::new(page_id, index)
    }

    pub fn write_u8(&mut self, pos: usize, value: u8) {
        self.0[pos] = value;
    }

    pub fn write_i8(&mut self, pos: usize, value: i8) {
        self.0[pos] = value as u8;
    }

    pub fn write_u16(&mut self, pos: usize, value: u16) {
        self.0[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, pos: usize, value: u32) {
        self.0[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, pos: usize, value: u64) {
        self.0[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, pos: usize, value: i32) {
        self.0[pos..pos + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, pos: usize, value: i64) {
        self.0[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, pos: usize, value: f64) {
        self.0[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, pos: usize, value: bool) {
        self.0[pos] = value as u8;
    }

    pub fn write_bytes(&mut self, pos: usize, value: &[u8]) {
        self.0[pos..pos + value.len()].copy_from_slice(value);
    }

    pub fn write_page_address(&mut self, pos: usize, value: PageAddress) {
        self.write_u32(pos, value.page_id());
        self.write_u8(pos + 4, value.index());
    }

    /// Reads a secondary-index key at `pos`: one tag byte (`bson::BsonType`)
    /// followed by the fixed-size or length-prefixed payload for that type.
    /// Mirrors `IndexNode::get_key_length`'s byte accounting exactly.
    pub fn read_index_key(&self, pos: usize) -> Result<bson::Value> {
        let tag = self.read_u8(pos);
        let ty = bson::BsonType::from_u8(tag).ok_or_else(crate::Error::invalid_index_key_tag)?;
        let mut p = pos + 1;

        Ok(match ty {
            bson::BsonType::MinValue => bson::Value::MinValue,
            bson::BsonType::Null => bson::Value::Null,
            bson::BsonType::MaxValue => bson::Value::MaxValue,
            bson::BsonType::Int32 => bson::Value::Int32(self.read_i32(p)),
            bson::BsonType::Int64 => bson::Value::Int64(self.read_i64(p)),
            bson::BsonType::Double => bson::Value::Double(self.read_f64(p)),
            bson::BsonType::Decimal => {
                let bytes: [u8; 16] = self.0[p..p + 16].try_into().unwrap();
                bson::Value::Decimal(bson::Decimal128::from_bytes(bytes))
            }
            bson::BsonType::Boolean => bson::Value::Boolean(self.read_bool(p)),
            bson::BsonType::DateTime => {
                let millis = self.read_i64(p);
                bson::Value::DateTime(
                    bson::DateTime::from_unix_milliseconds(millis)
                        .ok_or_else(|| crate::Error::invalid_index_key("date out of range"))?,
                )
            }
            bson::BsonType::ObjectId => {
                let bytes: [u8; 12] = self.0[p..p + 12].try_into().unwrap();
                bson::Value::ObjectId(bson::ObjectId::from_bytes(bytes))
            }
            bson::BsonType::Guid => {
                let bytes: [u8; 16] = self.0[p..p + 16].try_into().unwrap();
                bson::Value::Guid(bson::Guid::from_bytes(bytes))
            }
            bson::BsonType::String => {
                let len = self.read_u8(p) as usize;
                p += 1;
                bson::Value::String(String::from_utf8(self.0[p..p + len].to_vec())?)
            }
            bson::BsonType::Binary => {
                let len = self.read_u8(p) as usize;
                p += 1;
                bson::Value::Binary(bson::Binary::new(self.0[p..p + len].to_vec()))
            }
            bson::BsonType::Document | bson::BsonType::Array => {
                return Err(crate::Error::invalid_index_key(
                    "complex values cannot be used as index keys",
                ));
            }
        })
    }

    pub fn write_index_key(&mut self, pos: usize, value: &bson::Value) {
        self.write_u8(pos, value.ty() as u8);
        let mut p = pos + 1;

        match value {
            bson::Value::MinValue | bson::Value::Null | bson::Value::MaxValue => {}
            bson::Value::Int32(v) => self.write_i32(p, *v),
            bson::Value::Int64(v) => self.write_i64(p, *v),
            bson::Value::Double(v) => self.write_f64(p, *v),
            bson::Value::Decimal(v) => self.write_bytes(p, &v.bytes()),
            bson::Value::Boolean(v) => self.write_bool(p, *v),
            bson::Value::DateTime(v) => self.write_i64(p, v.as_unix_milliseconds()),
            bson::Value::ObjectId(v) => self.write_bytes(p, v.as_bytes()),
            bson::Value::Guid(v) => self.write_bytes(p, &v.to_bytes()),
            bson::Value::String(s) => {
                self.write_u8(p, s.len() as u8);
                p += 1;
                self.write_bytes(p, s.as_bytes());
            }
            bson::Value::Binary(b) => {
                self.write_u8(p, b.bytes().len() as u8);
                p += 1;
                self.write_bytes(p, b.bytes());
            }
            bson::Value::Document(_) | bson::Value::Array(_) => {
                unreachable!("complex keys are rejected before reaching the buffer")
            }
        }
    }
}

use super::Value;
use super::de::{BsonReader, LimitReader, ParseError, limit_reader, parse_element};
use super::BsonWriter;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::io::Cursor;

/// The bson document.
///
/// Since bson in litedb uses case-insensitive key comparison, this implementation does so.
#[derive(Clone, PartialEq)]
pub struct Document {
    inner: HashMap<CaseInsensitiveString, Value>,
}

#[repr(transparent)]
struct CaseInsensitiveStr(str);
#[derive(Clone)]
struct CaseInsensitiveString(String);

impl Document {
    pub fn new() -> Document {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Adds value to document.
    ///
    /// ### Panics
    /// This function will panic if the key contains null char (`'\0'`)
    pub fn insert(&mut self, key: String, value: impl Into<Value>) {
        check_key(&key);
        self.inner.insert(CaseInsensitiveString(key), value.into());
    }

    /// Gets the value with `key`.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&Value> {
        self.inner.get(CaseInsensitiveStr::new(key.as_ref()))
    }

    pub fn get_mut(&mut self, key: impl AsRef<str>) -> Option<&mut Value> {
        self.inner.get_mut(CaseInsensitiveStr::new(key.as_ref()))
    }

    pub fn contains_key(&self, key: impl AsRef<str>) -> bool {
        self.inner
            .contains_key(CaseInsensitiveStr::new(key.as_ref()))
    }

    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<Value> {
        self.inner.remove(CaseInsensitiveStr::new(key.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner.iter().map(|(k, v)| (k.0.as_str(), v))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Returns the size of serialized value, including the leading length
    /// prefix and the trailing null byte.
    pub fn get_serialized_value_len(&self) -> usize {
        4 + self
            .inner
            .iter()
            .map(|(k, v)| 1 + k.0.len() + 1 + v.get_serialized_value_len())
            .sum::<usize>()
            + 1
    }

    /// Writes the document to the BsonWriter, length-prefixed and
    /// null-terminated per the bson wire format.
    pub fn write_value<W: BsonWriter>(&self, w: &mut W) -> Result<(), W::Error> {
        let len = self.get_serialized_value_len();
        let len = i32::try_from(len).map_err(|_| W::when_too_large(len))?;
        w.write_bytes(&len.to_le_bytes())?;

        for (key, value) in self.inner.iter() {
            w.write_bytes(&[value.ty().bson_tag() as i8 as u8])?;
            w.write_bytes(key.0.as_bytes())?;
            w.write_bytes(&[0])?;
            value.write_value(w)?;
        }

        w.write_bytes(&[0])
    }

    pub(crate) fn parse_document_inner<R: BsonReader>(r: &mut R) -> Result<Document, R::Error> {
        let mut reader = limit_reader(r)?;
        let mut inner = HashMap::new();

        while let Some((key, value)) = parse_element(&mut reader)? {
            if inner
                .insert(CaseInsensitiveString(key.clone()), value)
                .is_some()
            {
                return Err(ParseError::DuplicatedKey(key).into());
            }
        }

        if !reader.is_end() {
            return Err(ParseError::RemainingDataInDocument.into());
        }

        Ok(Document { inner })
    }

    /// Decodes a single, length-prefixed bson document out of `bytes`.
    pub fn from_reader(bytes: &[u8]) -> Result<Document, ParseError> {
        let mut cursor = Cursor::new(bytes);
        Self::parse_document_inner(&mut cursor)
    }

    pub(crate) fn parse_document<R: BsonReader>(r: &mut R) -> Result<Document, R::Error> {
        Self::parse_document_inner(r)
    }

    /// Encodes this document to its length-prefixed binary representation.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; self.get_serialized_value_len()];
        let mut cursor = Cursor::new(&mut buffer[..]);
        self.write_value(&mut cursor)
            .unwrap_or_else(|e| match e {});
        buffer
    }
}

#[track_caller]
fn check_key(key: &String) {
    assert!(
        !key.as_bytes().contains(&0),
        "Key contains null char, which is disallowed for bson"
    );
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.inner, f)
    }
}

impl Debug for CaseInsensitiveString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl CaseInsensitiveStr {
    fn new(s: &str) -> &CaseInsensitiveStr {
        // SAFETY: CaseInsensitiveStr is transparent to str
        unsafe { &*(s as *const str as *const CaseInsensitiveStr) }
    }
}

impl Hash for CaseInsensitiveStr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.0.chars() {
            for c in c.to_uppercase() {
                state.write_u32(c as u32);
            }
        }
    }
}

impl PartialEq for CaseInsensitiveStr {
    fn eq(&self, other: &Self) -> bool {
        let this = self.0.chars().flat_map(char::to_uppercase);
        let other = other.0.chars().flat_map(char::to_uppercase);
        this.eq(other)
    }
}

impl Eq for CaseInsensitiveStr {}

// basically string implementation is based on CaseInsensitiveStr
impl Borrow<CaseInsensitiveStr> for CaseInsensitiveString {
    fn borrow(&self) -> &CaseInsensitiveStr {
        self.as_ref()
    }
}

impl AsRef<CaseInsensitiveStr> for CaseInsensitiveString {
    fn as_ref(&self) -> &CaseInsensitiveStr {
        CaseInsensitiveStr::new(&self.0)
    }
}

impl Hash for CaseInsensitiveString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state)
    }
}

impl PartialEq for CaseInsensitiveString {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref().eq(other.as_ref())
    }
}

impl Eq for CaseInsensitiveString {
}
